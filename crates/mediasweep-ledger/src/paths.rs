use std::path::PathBuf;

/// Well-known files under the state directory.
#[derive(Debug, Clone)]
pub struct SweepPaths {
    pub state_dir: PathBuf,
    pub ledger_db: PathBuf,
    pub notify_state: PathBuf,
    pub lock_file: PathBuf,
    pub tombstones_jsonl: PathBuf,
}

impl SweepPaths {
    /// Derive all paths from the state directory. Pure computation, no I/O.
    pub fn discover(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            ledger_db: state_dir.join("uploads.db"),
            notify_state: state_dir.join("last_notification.fp"),
            lock_file: state_dir.join("run.lock"),
            tombstones_jsonl: state_dir.join("tombstones.jsonl"),
            state_dir,
        }
    }

    /// Create the state directory. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        Ok(())
    }
}
