//! Two-phase eviction of a single candidate.
//!
//! The remote side must acknowledge the redaction before anything local is
//! touched. After acknowledgement, local files are removed best-effort and the
//! ledger row is deleted.

use crate::locator::MediaIndex;
use mediasweep_core::{ChatClient, EvictReason, UploadRecord};
use mediasweep_ledger::{append_tombstone, make_tombstone, SweepPaths, UploadLedger};
use std::path::{Path, PathBuf};

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    Evicted { bytes_freed: u64, files_removed: usize },
    /// Dry run: nothing touched, `bytes` is what the located files hold.
    WouldEvict { bytes: u64 },
    /// Remote acknowledgement failed; ledger row and files left in place.
    RemoteFailed,
}

impl EvictOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            EvictOutcome::Evicted { bytes_freed, .. } => *bytes_freed,
            EvictOutcome::WouldEvict { bytes } => *bytes,
            EvictOutcome::RemoteFailed => 0,
        }
    }

    pub fn counts_as_deleted(&self) -> bool {
        !matches!(self, EvictOutcome::RemoteFailed)
    }
}

/// Shared eviction state for one policy run.
pub struct Evictor<'a> {
    client: &'a dyn ChatClient,
    ledger: &'a UploadLedger,
    index: MediaIndex,
    tombstones: Option<&'a SweepPaths>,
    dry_run: bool,
}

impl<'a> Evictor<'a> {
    /// Indexes `media_root` once; every lookup in the run reuses that scan.
    pub fn new(
        client: &'a dyn ChatClient,
        ledger: &'a UploadLedger,
        media_root: &Path,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            ledger,
            index: MediaIndex::scan(media_root),
            tombstones: None,
            dry_run,
        }
    }

    /// Record completed evictions in the tombstone log.
    pub fn with_tombstones(mut self, paths: &'a SweepPaths) -> Self {
        self.tombstones = Some(paths);
        self
    }

    pub fn ledger(&self) -> &'a UploadLedger {
        self.ledger
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Files under the media root when the run started.
    pub fn file_count(&self) -> u64 {
        self.index.file_count()
    }

    pub fn evict(
        &mut self,
        record: &UploadRecord,
        reason: EvictReason,
    ) -> anyhow::Result<EvictOutcome> {
        let files = self.index.locate(&record.media_ref);

        if self.dry_run {
            let bytes: u64 = files.iter().filter_map(|f| file_len(f)).sum();
            // A file matched by several candidates is only freed once.
            self.index.forget(&files);
            tracing::info!(
                event_id = %record.event_id,
                class = %record.class(),
                %reason,
                files = files.len(),
                bytes,
                "dry-run: would evict"
            );
            return Ok(EvictOutcome::WouldEvict { bytes });
        }

        if let Err(e) = self
            .client
            .redact(&record.room_id, &record.event_id, &reason.redaction_text())
        {
            tracing::warn!(
                event_id = %record.event_id,
                room_id = %record.room_id,
                error = %e,
                "redaction failed, keeping local media"
            );
            return Ok(EvictOutcome::RemoteFailed);
        }

        let (bytes_freed, removed) = remove_files(&files);
        self.index.forget(&removed);
        if let Err(e) = self.ledger.delete(&record.event_id) {
            tracing::warn!(
                event_id = %record.event_id,
                error = %e,
                "ledger delete failed after redaction, row left behind"
            );
        }

        if let Some(paths) = self.tombstones {
            let tombstone = make_tombstone(record, reason, bytes_freed, removed.len());
            if let Err(e) = append_tombstone(paths, &tombstone) {
                tracing::warn!(event_id = %record.event_id, error = %e, "tombstone write failed");
            }
        }

        tracing::info!(
            event_id = %record.event_id,
            class = %record.class(),
            %reason,
            files = removed.len(),
            bytes = bytes_freed,
            "evicted"
        );
        Ok(EvictOutcome::Evicted {
            bytes_freed,
            files_removed: removed.len(),
        })
    }
}

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Remove every file, returning bytes released and the paths actually removed.
/// Files already gone are skipped; other failures are logged.
fn remove_files(files: &[PathBuf]) -> (u64, Vec<PathBuf>) {
    let mut freed = 0;
    let mut removed = Vec::new();
    for path in files {
        let Some(len) = file_len(path) else {
            continue;
        };
        match std::fs::remove_file(path) {
            Ok(()) => {
                freed += len;
                removed.push(path.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not remove media file");
            }
        }
    }
    (freed, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasweep_core::MockChat;
    use mediasweep_ledger::list_tombstones;

    struct Fixture {
        _tmp: tempfile::TempDir,
        media: PathBuf,
        paths: SweepPaths,
        ledger: UploadLedger,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("media");
        let paths = SweepPaths::discover(tmp.path().join("state"));
        paths.ensure_layout().unwrap();
        let ledger = UploadLedger::open_or_create(&paths.ledger_db).unwrap();
        Fixture {
            _tmp: tmp,
            media,
            paths,
            ledger,
        }
    }

    fn seed(fx: &Fixture, id: &str, media_id: &str, bytes: usize) -> UploadRecord {
        let rec = UploadRecord {
            event_id: id.to_string(),
            room_id: "!r:example.org".to_string(),
            sender_id: "@u:example.org".to_string(),
            media_ref: format!("mxc://example.org/{media_id}"),
            mime_type: "video/mp4".to_string(),
            size_bytes: bytes as u64,
            observed_at: 0,
        };
        fx.ledger.upsert(&rec).unwrap();
        let dir = fx.media.join("local_content");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(media_id), vec![1u8; bytes]).unwrap();
        std::fs::write(dir.join(format!("{media_id}.thumb")), vec![1u8; 3]).unwrap();
        rec
    }

    #[test]
    fn successful_eviction_removes_everything() {
        let fx = fixture();
        let rec = seed(&fx, "$a", "AAA", 100);
        let chat = MockChat::new();
        let mut ev = Evictor::new(&chat, &fx.ledger, &fx.media, false).with_tombstones(&fx.paths);

        let out = ev.evict(&rec, EvictReason::Retention).unwrap();
        assert_eq!(
            out,
            EvictOutcome::Evicted {
                bytes_freed: 103,
                files_removed: 2
            }
        );
        assert!(fx.ledger.get("$a").unwrap().is_none());
        assert!(!fx.media.join("local_content/AAA").exists());
        assert_eq!(chat.redactions()[0].2, "mediasweep cleanup: retention");

        let tombs = list_tombstones(&fx.paths).unwrap();
        assert_eq!(tombs.len(), 1);
        assert_eq!(tombs[0].bytes_freed, 103);
        assert_eq!(tombs[0].files_removed, 2);
    }

    #[test]
    fn remote_failure_leaves_row_and_files() {
        let fx = fixture();
        let rec = seed(&fx, "$b", "BBB", 50);
        let chat = MockChat::new().refuse_redaction("$b");
        let mut ev = Evictor::new(&chat, &fx.ledger, &fx.media, false).with_tombstones(&fx.paths);

        let out = ev.evict(&rec, EvictReason::Pressure).unwrap();
        assert_eq!(out, EvictOutcome::RemoteFailed);
        assert!(!out.counts_as_deleted());
        assert!(fx.ledger.get("$b").unwrap().is_some());
        assert!(fx.media.join("local_content/BBB").exists());
        assert!(fx.media.join("local_content/BBB.thumb").exists());
        assert!(list_tombstones(&fx.paths).unwrap().is_empty());
    }

    #[test]
    fn missing_files_still_complete_eviction() {
        let fx = fixture();
        let rec = UploadRecord {
            event_id: "$gone".into(),
            room_id: "!r".into(),
            sender_id: "@u".into(),
            media_ref: "mxc://example.org/nothing-here".into(),
            mime_type: String::new(),
            size_bytes: 999,
            observed_at: 0,
        };
        fx.ledger.upsert(&rec).unwrap();
        let chat = MockChat::new();
        let mut ev = Evictor::new(&chat, &fx.ledger, &fx.media, false);

        let out = ev.evict(&rec, EvictReason::Retention).unwrap();
        assert_eq!(
            out,
            EvictOutcome::Evicted {
                bytes_freed: 0,
                files_removed: 0
            }
        );
        assert_eq!(fx.ledger.count().unwrap(), 0);
    }

    #[test]
    fn unremovable_file_still_completes_eviction() {
        let fx = fixture();
        let rec = seed(&fx, "$d", "DDD", 20);
        let chat = MockChat::new();
        let mut ev = Evictor::new(&chat, &fx.ledger, &fx.media, false);

        // Indexed path turns into a non-empty directory after the scan.
        let blocked = fx.media.join("local_content/DDD");
        std::fs::remove_file(&blocked).unwrap();
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("inner"), b"x").unwrap();

        let out = ev.evict(&rec, EvictReason::Retention).unwrap();
        assert_eq!(
            out,
            EvictOutcome::Evicted {
                bytes_freed: 3,
                files_removed: 1
            }
        );
        assert!(blocked.join("inner").exists());
        assert!(fx.ledger.get("$d").unwrap().is_none());
    }

    #[test]
    fn ledger_failure_after_redaction_is_not_fatal() {
        let fx = fixture();
        let rec = seed(&fx, "$e", "EEE", 30);
        let chat = MockChat::new();
        let mut ev = Evictor::new(&chat, &fx.ledger, &fx.media, false).with_tombstones(&fx.paths);

        let other = rusqlite::Connection::open(&fx.paths.ledger_db).unwrap();
        other.execute_batch("DROP TABLE uploads;").unwrap();

        let out = ev.evict(&rec, EvictReason::Pressure).unwrap();
        assert_eq!(
            out,
            EvictOutcome::Evicted {
                bytes_freed: 33,
                files_removed: 2
            }
        );
        assert_eq!(chat.redactions().len(), 1);
        assert_eq!(list_tombstones(&fx.paths).unwrap().len(), 1);
    }

    fn overlapping_ids(fx: &Fixture) -> Vec<UploadRecord> {
        let dir = fx.media.join("local_content");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("abcd"), vec![1u8; 100]).unwrap();
        std::fs::write(dir.join("abc"), vec![1u8; 10]).unwrap();
        ["abcd", "abc"]
            .into_iter()
            .map(|id| {
                let rec = UploadRecord {
                    event_id: format!("${id}"),
                    room_id: "!r:example.org".into(),
                    sender_id: "@u:example.org".into(),
                    media_ref: format!("mxc://example.org/{id}"),
                    mime_type: String::new(),
                    size_bytes: 0,
                    observed_at: 0,
                };
                fx.ledger.upsert(&rec).unwrap();
                rec
            })
            .collect()
    }

    #[test]
    fn dry_run_counts_shared_files_once() {
        let fx = fixture();
        let records = overlapping_ids(&fx);
        let chat = MockChat::new();

        let mut dry = Evictor::new(&chat, &fx.ledger, &fx.media, true);
        let planned: u64 = records
            .iter()
            .map(|r| dry.evict(r, EvictReason::Retention).unwrap().bytes())
            .sum();
        assert_eq!(planned, 110);
        assert_eq!(fx.ledger.count().unwrap(), 2);

        let mut real = Evictor::new(&chat, &fx.ledger, &fx.media, false);
        let freed: u64 = records
            .iter()
            .map(|r| real.evict(r, EvictReason::Retention).unwrap().bytes())
            .sum();
        assert_eq!(freed, planned);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let fx = fixture();
        let rec = seed(&fx, "$c", "CCC", 40);
        let chat = MockChat::new();
        let mut ev = Evictor::new(&chat, &fx.ledger, &fx.media, true).with_tombstones(&fx.paths);

        let out = ev.evict(&rec, EvictReason::Emergency).unwrap();
        assert_eq!(out, EvictOutcome::WouldEvict { bytes: 43 });
        assert!(out.counts_as_deleted());
        assert!(chat.redactions().is_empty());
        assert_eq!(fx.ledger.count().unwrap(), 1);
        assert!(fx.media.join("local_content/CCC").exists());
        assert!(list_tombstones(&fx.paths).unwrap().is_empty());
    }
}
