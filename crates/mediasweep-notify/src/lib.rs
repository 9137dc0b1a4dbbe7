pub mod fingerprint;
pub mod format;
pub mod pipeline;
pub mod render;
pub mod state;
pub mod summary;

pub use fingerprint::fingerprint;
pub use format::{fallback_prefix, format_message, format_stats, storage_label};
pub use pipeline::{notify_run, NotifyOptions, NotifyOutcome};
pub use render::{
    validate_prefix, HttpGenerator, PersonalityConfig, PrefixRenderer, Renderer, TextGenerator,
};
pub use state::NotificationState;
pub use summary::{summarize, RunSummary};
