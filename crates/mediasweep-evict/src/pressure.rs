use crate::executor::{EvictOutcome, Evictor};
use crate::probe::DiskProbe;
use mediasweep_core::{EvictReason, Policy, RunMode, RunReport};

/// Evict largest-first until utilization drops below the pressure threshold.
///
/// Utilization is read before the first candidate and again after every
/// completed eviction. A dry run cannot re-measure, so it projects the
/// reading from the bytes it would have freed. Any probe failure aborts the
/// run with [`mediasweep_core::SweepError::Probe`].
pub fn run_pressure(
    evictor: &mut Evictor<'_>,
    policy: &Policy,
    probe: &dyn DiskProbe,
    now_ms: i64,
) -> anyhow::Result<RunReport> {
    policy.validate()?;
    let ledger = evictor.ledger();
    let mut report = RunReport::begin(RunMode::Pressure, *policy, evictor.dry_run());
    report.total_files_count = evictor.file_count();

    let initial = probe.usage()?;
    let mut usage = initial.used_fraction();
    let mut projected_used = initial.used_bytes();
    report.usage_before = Some(usage);

    tracing::info!(
        usage,
        threshold = policy.pressure_threshold,
        dry_run = report.dry_run,
        "pressure run started"
    );

    if usage >= policy.pressure_threshold {
        for candidate in ledger.select_candidates(policy, RunMode::Pressure, now_ms) {
            let candidate = candidate?;
            report.candidates_count += 1;
            let reason = if usage >= policy.emergency_threshold {
                EvictReason::Emergency
            } else {
                EvictReason::Pressure
            };

            match evictor.evict(&candidate, reason)? {
                EvictOutcome::RemoteFailed => {
                    report.failed_count += 1;
                    continue;
                }
                EvictOutcome::Evicted { bytes_freed, .. } => {
                    report.freed_bytes += bytes_freed;
                    usage = probe.usage()?.used_fraction();
                }
                EvictOutcome::WouldEvict { bytes } => {
                    report.freed_bytes += bytes;
                    projected_used = projected_used.saturating_sub(bytes);
                    usage = if initial.total_bytes == 0 {
                        0.0
                    } else {
                        projected_used as f64 / initial.total_bytes as f64
                    };
                }
            }
            report.deleted.record(candidate.class());
            if reason == EvictReason::Emergency {
                report.emergency_count += 1;
            }
            tracing::debug!(event_id = %candidate.event_id, usage, "utilization after eviction");

            if usage < policy.pressure_threshold {
                break;
            }
        }
    } else {
        tracing::info!(usage, "below pressure threshold, nothing to do");
    }

    report.usage_after = Some(usage);
    let report = report.finish();
    tracing::info!(
        deleted = report.deleted_count(),
        emergency = report.emergency_count,
        failed = report.failed_count,
        freed_bytes = report.freed_bytes,
        usage_after = usage,
        "pressure run finished"
    );
    Ok(report)
}
