use crate::executor::Evictor;
use crate::probe::DiskProbe;
use mediasweep_core::{EvictReason, Policy, RunMode, RunReport};

/// Evict every record past its class retention window.
///
/// Disk usage is read for the summary only; a failed reading does not stop
/// a retention run.
pub fn run_retention(
    evictor: &mut Evictor<'_>,
    policy: &Policy,
    probe: &dyn DiskProbe,
    now_ms: i64,
) -> anyhow::Result<RunReport> {
    policy.validate()?;
    let ledger = evictor.ledger();
    let mut report = RunReport::begin(RunMode::Retention, *policy, evictor.dry_run());

    report.usage_before = match probe.usage() {
        Ok(u) => Some(u.used_fraction()),
        Err(e) => {
            tracing::warn!(error = %e, "disk usage unavailable for retention summary");
            None
        }
    };
    report.total_files_count = evictor.file_count();
    report.candidates_count = ledger.count_retention_candidates(policy, now_ms)?;

    tracing::info!(
        candidates = report.candidates_count,
        image_days = policy.image_retention_days,
        non_image_days = policy.non_image_retention_days,
        dry_run = report.dry_run,
        "retention run started"
    );

    for candidate in ledger.select_candidates(policy, RunMode::Retention, now_ms) {
        let candidate = candidate?;
        let outcome = evictor.evict(&candidate, EvictReason::Retention)?;
        if !outcome.counts_as_deleted() {
            report.failed_count += 1;
            continue;
        }
        report.deleted.record(candidate.class());
        report.freed_bytes += outcome.bytes();
    }

    let report = report.finish();
    tracing::info!(
        deleted = report.deleted_count(),
        failed = report.failed_count,
        freed_bytes = report.freed_bytes,
        "retention run finished"
    );
    Ok(report)
}
