use crate::fingerprint::fingerprint;
use crate::format::{fallback_prefix, format_message};
use crate::render::Renderer;
use crate::state::NotificationState;
use crate::summary::RunSummary;
use mediasweep_core::ChatClient;

#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    /// Room that receives summaries. No room, no notification.
    pub room_id: Option<String>,
    pub send_zero_deletion_summaries: bool,
    /// Bypass the duplicate gate and the zero-deletion rule.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    NoRoom,
    /// Nothing was deleted and zero-deletion summaries are off.
    ZeroDeletions,
    /// Same fingerprint as the last summary sent.
    Duplicate,
    Sent { body: String },
    SendFailed,
}

/// Decide whether to post `summary`, build the message and send it.
/// Never fails: the run's side effects have already happened.
pub fn notify_run(
    client: &dyn ChatClient,
    state: &NotificationState,
    renderer: Option<&mut dyn Renderer>,
    summary: &RunSummary,
    options: &NotifyOptions,
) -> NotifyOutcome {
    let Some(room_id) = options.room_id.as_deref() else {
        tracing::debug!("no notification room configured");
        return NotifyOutcome::NoRoom;
    };
    let wanted = summary.deleted_count() > 0
        || options.send_zero_deletion_summaries
        || summary.dry_run
        || options.force;
    if !wanted {
        tracing::info!("zero-deletion summary not sent");
        return NotifyOutcome::ZeroDeletions;
    }

    let digest = fingerprint(summary);
    match state.should_notify(&digest, options.force) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(fingerprint = %digest, "duplicate summary suppressed");
            return NotifyOutcome::Duplicate;
        }
        Err(e) => {
            tracing::warn!(path = %state.path().display(), error = %e, "notification state unavailable, sending anyway");
        }
    }

    let prefix = renderer
        .and_then(|r| r.render_prefix(summary))
        .unwrap_or_else(|| fallback_prefix(summary).to_string());
    let body = format_message(summary, &prefix);

    match client.send_text(room_id, &body) {
        Ok(()) => {
            tracing::info!(room_id, fingerprint = %digest, "summary sent");
            NotifyOutcome::Sent { body }
        }
        Err(e) => {
            tracing::warn!(room_id, error = %e, "summary send failed");
            NotifyOutcome::SendFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::summarize;
    use mediasweep_core::{MediaClass, MockChat, Policy, RunMode, RunReport};

    struct FixedRenderer(Option<String>);

    impl Renderer for FixedRenderer {
        fn render_prefix(&mut self, _summary: &RunSummary) -> Option<String> {
            self.0.clone()
        }
    }

    fn summary(deleted: u64, dry_run: bool) -> RunSummary {
        let mut report = RunReport::begin(RunMode::Retention, Policy::default(), dry_run);
        report.usage_before = Some(0.3);
        for _ in 0..deleted {
            report.deleted.record(MediaClass::Image);
        }
        summarize(&report.finish(), "example.org")
    }

    fn options(room: Option<&str>) -> NotifyOptions {
        NotifyOptions {
            room_id: room.map(str::to_string),
            ..NotifyOptions::default()
        }
    }

    fn state() -> (tempfile::TempDir, NotificationState) {
        let tmp = tempfile::tempdir().unwrap();
        let state = NotificationState::new(tmp.path().join("last_notification.fp"));
        (tmp, state)
    }

    #[test]
    fn no_room_means_no_send() {
        let (_tmp, st) = state();
        let chat = MockChat::new();
        let out = notify_run(&chat, &st, None, &summary(2, false), &options(None));
        assert_eq!(out, NotifyOutcome::NoRoom);
        assert!(chat.sent().is_empty());
    }

    #[test]
    fn zero_deletions_gated_unless_enabled() {
        let (_tmp, st) = state();
        let chat = MockChat::new();
        let out = notify_run(&chat, &st, None, &summary(0, false), &options(Some("!log")));
        assert_eq!(out, NotifyOutcome::ZeroDeletions);

        let mut opts = options(Some("!log"));
        opts.send_zero_deletion_summaries = true;
        let out = notify_run(&chat, &st, None, &summary(0, false), &opts);
        assert!(matches!(out, NotifyOutcome::Sent { .. }));
    }

    #[test]
    fn dry_run_summaries_are_sent_with_marker() {
        let (_tmp, st) = state();
        let chat = MockChat::new();
        let out = notify_run(&chat, &st, None, &summary(0, true), &options(Some("!log")));
        let NotifyOutcome::Sent { body } = out else {
            panic!("expected a send");
        };
        assert!(body.starts_with("[DRY-RUN] Storage reviewed, no action needed."));
        assert_eq!(chat.sent()[0].0, "!log");
    }

    #[test]
    fn duplicate_suppressed_force_resends() {
        let (_tmp, st) = state();
        let chat = MockChat::new();
        let s = summary(1, false);
        let opts = options(Some("!log"));

        assert!(matches!(
            notify_run(&chat, &st, None, &s, &opts),
            NotifyOutcome::Sent { .. }
        ));
        assert_eq!(notify_run(&chat, &st, None, &s, &opts), NotifyOutcome::Duplicate);

        let forced = NotifyOptions {
            force: true,
            ..opts
        };
        assert!(matches!(
            notify_run(&chat, &st, None, &s, &forced),
            NotifyOutcome::Sent { .. }
        ));
        assert_eq!(chat.sent().len(), 2);
    }

    #[test]
    fn rendered_prefix_used_when_available() {
        let (_tmp, st) = state();
        let chat = MockChat::new();
        let mut renderer = FixedRenderer(Some("The archive breathes easier.".into()));
        let out = notify_run(
            &chat,
            &st,
            Some(&mut renderer),
            &summary(1, false),
            &options(Some("!log")),
        );
        let NotifyOutcome::Sent { body } = out else {
            panic!("expected a send");
        };
        assert!(body.starts_with("The archive breathes easier.\n\nDisk: 30.0%"));
    }

    #[test]
    fn renderer_fallback_and_send_failure() {
        let (_tmp, st) = state();
        let chat = MockChat::new().failing_sends();
        let mut renderer = FixedRenderer(None);
        let out = notify_run(
            &chat,
            &st,
            Some(&mut renderer),
            &summary(1, false),
            &options(Some("!log")),
        );
        assert_eq!(out, NotifyOutcome::SendFailed);
        // The gate already recorded this digest.
        assert!(st.last_sent().unwrap().is_some());
    }
}
