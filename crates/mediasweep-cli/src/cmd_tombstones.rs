use crate::config::Config;
use mediasweep_ledger::{list_tombstones, SweepPaths, Tombstone};

pub fn execute(config: &Config, limit: Option<usize>) -> anyhow::Result<()> {
    let paths = SweepPaths::discover(&config.paths.state_dir);
    let tombstones = list_tombstones(&paths)?;
    if tombstones.is_empty() {
        println!("No evictions recorded.");
        return Ok(());
    }

    let shown = most_recent(&tombstones, limit);
    for t in shown {
        println!(
            "{}  {:<9}  {:<9}  {:>12}  {}  {}",
            t.evicted_at,
            t.reason.to_string(),
            t.class.to_string(),
            t.bytes_freed,
            t.event_id,
            t.media_ref
        );
    }
    if shown.len() < tombstones.len() {
        println!("({} of {} shown)", shown.len(), tombstones.len());
    }
    Ok(())
}

/// Tail of the log, oldest first.
fn most_recent(tombstones: &[Tombstone], limit: Option<usize>) -> &[Tombstone] {
    match limit {
        Some(n) if n < tombstones.len() => &tombstones[tombstones.len() - n..],
        _ => tombstones,
    }
}
