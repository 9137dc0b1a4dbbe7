use crate::summary::RunSummary;
use mediasweep_core::RunMode;

pub const DRY_RUN_MARKER: &str = "[DRY-RUN] ";

/// Storage label for a utilization percentage.
pub fn storage_label(percent: f64, pressure_threshold: f64, emergency_threshold: f64) -> &'static str {
    if percent >= emergency_threshold {
        "critical"
    } else if percent >= pressure_threshold {
        "pressure"
    } else if percent >= 75.0 {
        "tight"
    } else if percent >= 50.0 {
        "OK"
    } else {
        "healthy"
    }
}

/// Label for the summary's "before" reading.
pub fn summary_label(summary: &RunSummary) -> &'static str {
    storage_label(
        summary.disk.percent_before.unwrap_or(0.0),
        summary.disk.pressure_threshold,
        summary.disk.emergency_threshold,
    )
}

/// Deterministic opening sentence, used whenever no rendered prefix is accepted.
pub fn fallback_prefix(summary: &RunSummary) -> &'static str {
    if summary.deleted_count() > 0 {
        return "Cleanup executed.";
    }
    match summary_label(summary) {
        "healthy" | "OK" => "Storage reviewed, no action needed.",
        _ => "Storage is getting tight.",
    }
}

/// Multi-line statistics block.
pub fn format_stats(summary: &RunSummary) -> String {
    let disk = &summary.disk;
    let actions = &summary.actions;
    let before = disk.percent_before.unwrap_or(0.0);
    let result = if actions.deleted_count == 0 {
        "no action"
    } else {
        "cleanup performed"
    };

    let mut lines = Vec::new();
    match summary.mode {
        RunMode::Retention => {
            lines.push(format!(
                "Disk: {before:.1}% (threshold {:.1}%)",
                disk.pressure_threshold
            ));
            lines.push(format!("Storage: {}", summary_label(summary)));
            lines.push(format!("Retention candidates: {}", summary.candidates_count));
        }
        RunMode::Pressure => {
            let after = disk.percent_after.unwrap_or(before);
            lines.push(format!(
                "Disk: {before:.1}% → {after:.1}% (threshold {:.1}%)",
                disk.pressure_threshold
            ));
            lines.push(format!("Storage: {}", summary_label(summary)));
        }
    }
    lines.push(format!(
        "Deleted: {} (images={}, non-images={})",
        actions.deleted_count, actions.deleted_by_type.images, actions.deleted_by_type.non_images
    ));
    lines.push(format!("Freed: {:.2} GB", summary.freed_gb()));
    if summary.mode == RunMode::Retention && summary.total_files_count > 0 {
        lines.push(format!("Files on disk: {}", summary.total_files_count));
    }
    lines.push(format!("Duration: {}s", summary.timing.duration_seconds));
    lines.push(format!("Result: {result}"));
    lines.join("\n")
}

/// Full message: optional dry-run marker, prefix sentence, blank line, stats.
pub fn format_message(summary: &RunSummary, prefix: &str) -> String {
    let marker = if summary.dry_run { DRY_RUN_MARKER } else { "" };
    format!("{marker}{prefix}\n\n{}", format_stats(summary))
}
