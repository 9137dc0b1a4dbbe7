use crate::config::Config;
use mediasweep_core::clock::{now_ms, DAY_MS};
use mediasweep_evict::{DiskProbe, VolumeProbe};
use mediasweep_ledger::{SweepPaths, UploadLedger};
use mediasweep_notify::summary::to_percent;
use mediasweep_notify::{storage_label, NotificationState};

pub fn execute(config: &Config) -> anyhow::Result<()> {
    let policy = config.to_policy()?;
    let paths = SweepPaths::discover(&config.paths.state_dir);
    let ledger = UploadLedger::open_or_create(&paths.ledger_db)?;
    let stats = ledger.stats()?;

    println!("Ledger: {}", paths.ledger_db.display());
    println!(
        "Uploads tracked: {} (images={}, non-images={})",
        stats.records, stats.images, stats.non_images
    );
    println!("Tracked size: {:.2} GB", stats.total_bytes as f64 / GIB);
    match stats.oldest_observed_at {
        Some(ms) => println!("Oldest upload: {} days ago", age_days(ms)),
        None => println!("Oldest upload: (none)"),
    }

    let probe = VolumeProbe::new(&config.paths.media_root);
    match probe.usage() {
        Ok(usage) => {
            let percent = to_percent(usage.used_fraction());
            let label = storage_label(
                percent,
                to_percent(policy.pressure_threshold),
                to_percent(policy.emergency_threshold),
            );
            println!(
                "Disk: {percent:.1}% of {:.2} GB ({label})",
                usage.total_bytes as f64 / GIB
            );
        }
        Err(e) => println!("Disk: unavailable ({e})"),
    }

    let state = NotificationState::new(&paths.notify_state);
    match state.last_sent()? {
        Some(digest) => println!("Last notification: {digest}"),
        None => println!("Last notification: (none)"),
    }
    Ok(())
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn age_days(observed_at_ms: i64) -> i64 {
    (now_ms() - observed_at_ms).max(0) / DAY_MS
}
