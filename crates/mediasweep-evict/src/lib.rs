pub mod executor;
pub mod ingest;
pub mod locator;
pub mod pressure;
pub mod probe;
pub mod retention;

pub use executor::{EvictOutcome, Evictor};
pub use ingest::{sync_uploads, IngestReport};
pub use locator::{locate, MediaIndex};
pub use pressure::run_pressure;
pub use probe::{DiskProbe, DiskUsage, ScriptedProbe, VolumeProbe};
pub use retention::run_retention;

use mediasweep_core::{Policy, RunMode, RunReport};

/// Run the policy selected by `mode` end to end.
pub fn run_policy(
    mode: RunMode,
    evictor: &mut Evictor<'_>,
    policy: &Policy,
    probe: &dyn DiskProbe,
    now_ms: i64,
) -> anyhow::Result<RunReport> {
    match mode {
        RunMode::Retention => run_retention(evictor, policy, probe, now_ms),
        RunMode::Pressure => run_pressure(evictor, policy, probe, now_ms),
    }
}
