use crate::cmd_sync::{connect, join_invites};
use crate::config::Config;
use mediasweep_core::clock::now_ms;
use mediasweep_core::{ChatClient, RunMode};
use mediasweep_evict::{run_policy, sync_uploads, Evictor, VolumeProbe};
use mediasweep_ledger::{RunLock, SweepPaths, UploadLedger};
use mediasweep_notify::{
    notify_run, summarize, NotificationState, NotifyOptions, NotifyOutcome, PrefixRenderer,
    Renderer, RunSummary,
};

pub struct RunParams<'a> {
    pub config: &'a Config,
    pub mode: RunMode,
    pub dry_run: bool,
    pub force_notify: bool,
    pub skip_sync: bool,
}

pub fn execute(params: RunParams<'_>) -> anyhow::Result<()> {
    let config = params.config;
    let policy = config.to_policy()?;
    let paths = SweepPaths::discover(&config.paths.state_dir);
    let _lock = RunLock::acquire(&paths)?;
    let ledger = UploadLedger::open_or_create(&paths.ledger_db)?;
    let client = connect(config)?;

    join_invites(&client, config);
    if params.skip_sync {
        tracing::info!("ingestion skipped");
    } else if let Err(e) = sync_uploads(
        &client,
        &ledger,
        &config.rooms_allowlist,
        config.ingest.history_limit,
    ) {
        tracing::warn!(error = %e, "ingestion failed, evicting from existing ledger");
    }

    let report = {
        let mut evictor = Evictor::new(&client, &ledger, &config.paths.media_root, params.dry_run)
            .with_tombstones(&paths);
        let probe = VolumeProbe::new(&config.paths.media_root);
        run_policy(params.mode, &mut evictor, &policy, &probe, now_ms())?
    };

    let server = config
        .server_name
        .clone()
        .unwrap_or_else(|| client.server_name());
    let summary = summarize(&report, &server);
    print_summary(&summary);

    let outcome = send_summary(&client, config, &paths, &summary, params.force_notify);
    tracing::debug!(outcome = ?outcome, "notification finished");
    Ok(())
}

fn send_summary(
    client: &dyn ChatClient,
    config: &Config,
    paths: &SweepPaths,
    summary: &RunSummary,
    force: bool,
) -> NotifyOutcome {
    let state = NotificationState::new(&paths.notify_state);
    let options = NotifyOptions {
        room_id: config.notifications.log_room_id.clone(),
        send_zero_deletion_summaries: config.notifications.send_zero_deletion_summaries,
        force,
    };
    let mut renderer = config
        .add_personality
        .enabled
        .then(|| PrefixRenderer::from_config(&config.add_personality));
    let renderer = renderer.as_mut().map(|r| r as &mut dyn Renderer);
    notify_run(client, &state, renderer, summary, &options)
}

fn print_summary(summary: &RunSummary) {
    let actions = &summary.actions;
    let (verb, tag) = if summary.dry_run {
        ("Would delete", ", dry run")
    } else {
        ("Deleted", "")
    };
    println!("Run {} ({}{tag})", summary.run_id, summary.mode);
    if let Some(before) = summary.disk.percent_before {
        match summary.disk.percent_after {
            Some(after) => println!("Disk: {before:.1}% -> {after:.1}%"),
            None => println!("Disk: {before:.1}%"),
        }
    }
    println!(
        "{verb}: {} (images={}, non-images={})",
        actions.deleted_count, actions.deleted_by_type.images, actions.deleted_by_type.non_images
    );
    println!("Freed: {:.2} GB", summary.freed_gb());
    if actions.emergency_count > 0 {
        println!("Emergency evictions: {}", actions.emergency_count);
    }
    if actions.failed_count > 0 {
        println!("Remote failures: {}", actions.failed_count);
    }
}
