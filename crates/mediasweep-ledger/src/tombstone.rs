use crate::paths::SweepPaths;
use anyhow::Context;
use mediasweep_core::clock::now_rfc3339;
use mediasweep_core::{EvictReason, MediaClass, UploadRecord};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};

/// Audit record of one evicted upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub event_id: String,
    pub room_id: String,
    pub media_ref: String,
    pub class: MediaClass,
    pub reason: EvictReason,
    pub size_bytes: u64,
    /// Bytes actually released from the media root.
    pub bytes_freed: u64,
    pub files_removed: usize,
    pub evicted_at: String,
}

/// Append one JSON line to the eviction log.
pub fn append_tombstone(paths: &SweepPaths, tombstone: &Tombstone) -> anyhow::Result<()> {
    let log = &paths.tombstones_jsonl;
    let mut entry = serde_json::to_vec(tombstone)?;
    entry.push(b'\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .and_then(|mut f| f.write_all(&entry))
        .with_context(|| format!("cannot append to {}", log.display()))
}

/// Every logged eviction, in the order it happened. No log yet means none.
pub fn list_tombstones(paths: &SweepPaths) -> anyhow::Result<Vec<Tombstone>> {
    let log = &paths.tombstones_jsonl;
    let file = match File::open(log) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("cannot open {}", log.display())),
    };

    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: Tombstone = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed tombstone", log.display(), idx + 1))?;
        out.push(entry);
    }
    Ok(out)
}

/// Create a tombstone for `record` stamped with the current time.
pub fn make_tombstone(
    record: &UploadRecord,
    reason: EvictReason,
    bytes_freed: u64,
    files_removed: usize,
) -> Tombstone {
    Tombstone {
        event_id: record.event_id.clone(),
        room_id: record.room_id.clone(),
        media_ref: record.media_ref.clone(),
        class: record.class(),
        reason,
        size_bytes: record.size_bytes,
        bytes_freed,
        files_removed,
        evicted_at: now_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(id: &str, mime: &str) -> UploadRecord {
        UploadRecord {
            event_id: id.to_string(),
            room_id: "!r:example.org".to_string(),
            sender_id: "@bob:example.org".to_string(),
            media_ref: "mxc://example.org/abc".to_string(),
            mime_type: mime.to_string(),
            size_bytes: 2048,
            observed_at: 0,
        }
    }

    #[test]
    fn tombstone_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SweepPaths::discover(tmp.path());
        paths.ensure_layout().unwrap();

        let t1 = make_tombstone(&upload("$one", "image/png"), EvictReason::Retention, 2048, 2);
        let t2 = make_tombstone(&upload("$two", "video/mp4"), EvictReason::Emergency, 0, 0);
        append_tombstone(&paths, &t1).unwrap();
        append_tombstone(&paths, &t2).unwrap();

        let loaded = list_tombstones(&paths).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], t1);
        assert_eq!(loaded[0].class, MediaClass::Image);
        assert_eq!(loaded[1].reason, EvictReason::Emergency);
        assert_eq!(loaded[1].class, MediaClass::NonImage);
    }

    #[test]
    fn missing_file_returns_empty() {
        let paths = SweepPaths::discover("/nonexistent/mediasweep/state");
        assert!(list_tombstones(&paths).unwrap().is_empty());
    }

    #[test]
    fn malformed_line_reports_position() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SweepPaths::discover(tmp.path());
        append_tombstone(&paths, &make_tombstone(&upload("$ok", ""), EvictReason::Retention, 1, 1))
            .unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&paths.tombstones_jsonl)
            .unwrap()
            .write_all(b"\n{not json\n")
            .unwrap();

        let err = list_tombstones(&paths).unwrap_err();
        assert!(format!("{err:#}").contains("tombstones.jsonl:3"));
    }

    #[test]
    fn reason_serialized_snake_case() {
        let t = make_tombstone(&upload("$x", ""), EvictReason::Pressure, 1, 1);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["reason"], "pressure");
        assert_eq!(json["class"], "non_image");
    }
}
