use crate::types::{MediaClass, Policy, RunMode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Per-class deletion tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub images: u64,
    pub non_images: u64,
}

impl ClassCounts {
    pub fn record(&mut self, class: MediaClass) {
        match class {
            MediaClass::Image => self.images += 1,
            MediaClass::NonImage => self.non_images += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.images + self.non_images
    }
}

/// Raw outcome of one policy run, before it is summarized for humans.
///
/// Utilization values are used fractions of the volume in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub dry_run: bool,
    pub policy: Policy,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub usage_before: Option<f64>,
    pub usage_after: Option<f64>,
    pub candidates_count: u64,
    pub total_files_count: u64,
    pub deleted: ClassCounts,
    pub freed_bytes: u64,
    /// Candidates skipped because the remote side refused or failed.
    pub failed_count: u64,
    pub emergency_count: u64,
}

impl RunReport {
    pub fn begin(mode: RunMode, policy: Policy, dry_run: bool) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            mode,
            dry_run,
            policy,
            started_at: now,
            finished_at: now,
            usage_before: None,
            usage_after: None,
            candidates_count: 0,
            total_files_count: 0,
            deleted: ClassCounts::default(),
            freed_bytes: 0,
            failed_count: 0,
            emergency_count: 0,
        }
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted.total()
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = OffsetDateTime::now_utc();
        self
    }
}
