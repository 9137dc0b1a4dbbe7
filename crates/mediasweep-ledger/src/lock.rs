use crate::paths::SweepPaths;
use anyhow::Context;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

/// Exclusive run lock on `run.lock` in the state directory.
/// Retention and pressure runs mutate the same rows, so only one may hold it.
/// Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _handle: File,
}

impl RunLock {
    /// Non-blocking; a held lock is reported as an error, not waited on.
    pub fn acquire(paths: &SweepPaths) -> anyhow::Result<Self> {
        paths.ensure_layout()?;
        let path = paths.lock_file.clone();
        let handle = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("cannot open run lock {}", path.display()))?;

        if handle.try_lock_exclusive().is_err() {
            anyhow::bail!("another mediasweep run holds {}", path.display());
        }
        tracing::debug!(path = %path.display(), "run lock acquired");
        Ok(Self {
            path,
            _handle: handle,
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "run lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SweepPaths::discover(tmp.path().join("state"));

        let held = RunLock::acquire(&paths).unwrap();
        let err = RunLock::acquire(&paths).unwrap_err();
        assert!(err.to_string().contains("another mediasweep run"));

        drop(held);
        assert!(RunLock::acquire(&paths).is_ok());
        assert!(paths.lock_file.exists());
    }
}
