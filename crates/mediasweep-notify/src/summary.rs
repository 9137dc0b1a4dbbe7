use mediasweep_core::clock::rfc3339;
use mediasweep_core::{ClassCounts, RunMode, RunReport};
use serde::{Deserialize, Serialize};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Structured outcome of one policy run, as reported to humans.
///
/// Utilization values are percentages rounded to one decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub mode: RunMode,
    pub server: String,
    pub dry_run: bool,
    pub disk: DiskSummary,
    pub actions: ActionSummary,
    /// Retention runs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicySummary>,
    pub candidates_count: u64,
    pub total_files_count: u64,
    pub timing: Timing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSummary {
    pub percent_before: Option<f64>,
    pub percent_after: Option<f64>,
    pub pressure_threshold: f64,
    pub emergency_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub deleted_count: u64,
    pub freed_bytes: u64,
    pub deleted_by_type: ClassCounts,
    pub emergency_count: u64,
    pub failed_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub image_days: u32,
    pub non_image_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub started_at: String,
    pub finished_at: String,
    pub duration_seconds: u64,
}

impl RunSummary {
    pub fn freed_gb(&self) -> f64 {
        self.actions.freed_bytes as f64 / BYTES_PER_GB
    }

    pub fn deleted_count(&self) -> u64 {
        self.actions.deleted_count
    }
}

/// Round a used fraction to a percentage with one decimal.
pub fn to_percent(fraction: f64) -> f64 {
    (fraction * 1000.0).round() / 10.0
}

/// Build the human-facing summary of a finished run.
pub fn summarize(report: &RunReport, server: &str) -> RunSummary {
    let duration = (report.finished_at - report.started_at).whole_seconds().max(0) as u64;
    let policy = match report.mode {
        RunMode::Retention => Some(PolicySummary {
            image_days: report.policy.image_retention_days,
            non_image_days: report.policy.non_image_retention_days,
        }),
        RunMode::Pressure => None,
    };

    RunSummary {
        run_id: ulid::Ulid::new().to_string(),
        mode: report.mode,
        server: server.to_string(),
        dry_run: report.dry_run,
        disk: DiskSummary {
            percent_before: report.usage_before.map(to_percent),
            percent_after: report.usage_after.map(to_percent),
            pressure_threshold: to_percent(report.policy.pressure_threshold),
            emergency_threshold: to_percent(report.policy.emergency_threshold),
        },
        actions: ActionSummary {
            deleted_count: report.deleted_count(),
            freed_bytes: report.freed_bytes,
            deleted_by_type: report.deleted,
            emergency_count: report.emergency_count,
            failed_count: report.failed_count,
        },
        policy,
        candidates_count: report.candidates_count,
        total_files_count: report.total_files_count,
        timing: Timing {
            started_at: rfc3339(report.started_at),
            finished_at: rfc3339(report.finished_at),
            duration_seconds: duration,
        },
    }
}
