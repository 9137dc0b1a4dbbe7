use mediasweep_ledger::write_atomic;
use std::path::{Path, PathBuf};

/// Last-sent summary fingerprint, one digest string in a file.
pub struct NotificationState {
    path: PathBuf,
}

impl NotificationState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted digest, if any. An empty file counts as none.
    pub fn last_sent(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => {
                let s = s.trim();
                Ok((!s.is_empty()).then(|| s.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Equality gate. `force` always passes without touching the stored value.
    /// Otherwise a digest equal to the last one is suppressed; a new digest is
    /// persisted and passes.
    pub fn should_notify(&self, digest: &str, force: bool) -> anyhow::Result<bool> {
        if force {
            return Ok(true);
        }
        if self.last_sent()?.as_deref() == Some(digest) {
            return Ok(false);
        }
        write_atomic(&self.path, digest.as_bytes())?;
        Ok(true)
    }
}
