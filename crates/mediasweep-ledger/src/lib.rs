pub mod atomic;
pub mod lock;
pub mod paths;
pub mod store;
pub mod tombstone;

pub use atomic::write_atomic;
pub use lock::RunLock;
pub use paths::SweepPaths;
pub use store::{Candidates, LedgerStats, UploadLedger};
pub use tombstone::{append_tombstone, list_tombstones, make_tombstone, Tombstone};
