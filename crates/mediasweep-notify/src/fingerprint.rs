use crate::summary::RunSummary;
use mediasweep_core::digest::value_digest;
use mediasweep_core::RunMode;
use serde_json::{json, Value};

/// Stable fields of a summary. Run id, timestamps, duration and failure
/// counts are left out so identical outcomes hash identically.
fn stable_view(summary: &RunSummary) -> Value {
    let mut view = json!({
        "mode": summary.mode,
        "server": summary.server,
        "dry_run": summary.dry_run,
        "disk": {
            "percent_before": summary.disk.percent_before,
            "percent_after": summary.disk.percent_after,
            "pressure_threshold": summary.disk.pressure_threshold,
            "emergency_threshold": summary.disk.emergency_threshold,
        },
        "actions": {
            "deleted_count": summary.actions.deleted_count,
            "freed_bytes": summary.actions.freed_bytes,
            "deleted_by_type": {
                "images": summary.actions.deleted_by_type.images,
                "non_images": summary.actions.deleted_by_type.non_images,
            },
        },
    });

    if summary.mode == RunMode::Retention {
        let policy = summary.policy.as_ref().map(|p| {
            json!({
                "image_days": p.image_days,
                "non_image_days": p.non_image_days,
            })
        });
        view["policy"] = policy.unwrap_or(Value::Null);
        view["candidates_count"] = json!(summary.candidates_count);
        view["total_files_count"] = json!(summary.total_files_count);
    }
    view
}

/// SHA-256 hex digest of the summary's stable fields.
pub fn fingerprint(summary: &RunSummary) -> String {
    value_digest(&stable_view(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::summarize;
    use mediasweep_core::{MediaClass, Policy, RunReport};

    fn summary(mode: RunMode) -> RunSummary {
        let mut report = RunReport::begin(mode, Policy::default(), false);
        report.usage_before = Some(0.9);
        report.usage_after = Some(0.8);
        report.deleted.record(MediaClass::NonImage);
        report.freed_bytes = 4096;
        summarize(&report.finish(), "example.org")
    }

    #[test]
    fn ignores_volatile_fields() {
        let a = summary(RunMode::Pressure);
        let mut b = a.clone();
        b.run_id = "01HZZZZZZZZZZZZZZZZZZZZZZZ".into();
        b.timing.started_at = "2020-01-01T00:00:00Z".into();
        b.timing.finished_at = "2020-01-01T01:00:00Z".into();
        b.timing.duration_seconds = 3600;
        b.actions.failed_count = 7;
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn changes_with_outcome() {
        let a = summary(RunMode::Retention);
        let mut more_deleted = a.clone();
        more_deleted.actions.deleted_count += 1;
        let mut more_freed = a.clone();
        more_freed.actions.freed_bytes += 1;

        assert_ne!(fingerprint(&a), fingerprint(&more_deleted));
        assert_ne!(fingerprint(&a), fingerprint(&more_freed));
    }

    #[test]
    fn retention_fields_only_count_for_retention() {
        let a = summary(RunMode::Pressure);
        let mut b = a.clone();
        b.total_files_count = 999;
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let r = summary(RunMode::Retention);
        let mut r2 = r.clone();
        r2.total_files_count = 999;
        assert_ne!(fingerprint(&r), fingerprint(&r2));
    }

    #[test]
    fn dry_run_differs_from_real_run() {
        let a = summary(RunMode::Pressure);
        let mut b = a.clone();
        b.dry_run = true;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
