use crate::config::Config;
use mediasweep_evict::{sync_uploads, IngestReport};
use mediasweep_ledger::{RunLock, SweepPaths, UploadLedger};
use mediasweep_matrix::MatrixClient;

pub fn execute(config: &Config) -> anyhow::Result<()> {
    let paths = SweepPaths::discover(&config.paths.state_dir);
    let _lock = RunLock::acquire(&paths)?;
    let ledger = UploadLedger::open_or_create(&paths.ledger_db)?;
    let client = connect(config)?;

    join_invites(&client, config);
    let report = sync_uploads(
        &client,
        &ledger,
        &config.rooms_allowlist,
        config.ingest.history_limit,
    )?;
    print_report(&report);
    Ok(())
}

pub(crate) fn connect(config: &Config) -> anyhow::Result<MatrixClient> {
    let client = MatrixClient::new(&config.homeserver_url, &config.bot.access_token)?;
    match client.whoami() {
        Ok(user_id) if user_id != config.bot.mxid => {
            tracing::warn!(expected = %config.bot.mxid, actual = %user_id, "access token belongs to another user");
        }
        Ok(user_id) => tracing::debug!(user_id = %user_id, "authenticated"),
        Err(e) => tracing::warn!(error = %e, "whoami failed"),
    }
    Ok(client)
}

/// Accept pending invites for allowed rooms. Never fails the caller.
pub(crate) fn join_invites(client: &MatrixClient, config: &Config) {
    match client.join_invites(&config.invite_allowlist()) {
        Ok(joined) if !joined.is_empty() => {
            tracing::info!(count = joined.len(), "joined invited rooms");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "invite check failed"),
    }
}

fn print_report(report: &IngestReport) {
    println!("Rooms scanned: {}", report.rooms_scanned);
    if report.rooms_failed > 0 {
        println!("Rooms failed:  {}", report.rooms_failed);
    }
    println!("Media events:  {}", report.media_events);
    println!("New uploads:   {}", report.inserted);
}
