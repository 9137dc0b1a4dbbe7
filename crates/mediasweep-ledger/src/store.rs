//! SQLite-backed upload ledger.
//!
//! One `uploads.db` file in WAL mode. Each row is one observed media upload,
//! keyed by the event that announced it.

use mediasweep_core::{MediaClass, Policy, RunMode, UploadRecord};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::VecDeque;
use std::path::Path;

const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS uploads (
    event_id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    media_ref TEXT NOT NULL,
    mime_type TEXT NOT NULL DEFAULT '',
    size_bytes INTEGER NOT NULL DEFAULT 0,
    observed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_uploads_observed_at ON uploads(observed_at);
CREATE INDEX IF NOT EXISTS idx_uploads_size ON uploads(size_bytes);
CREATE INDEX IF NOT EXISTS idx_uploads_media_ref ON uploads(media_ref);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const SCHEMA_VERSION: u32 = 1;

/// Rows fetched per candidate page.
const PAGE_SIZE: i64 = 128;

/// Candidate rows with the derived image flag. Row-value comparisons on the
/// sort key run against this projection.
const CANDIDATE_SOURCE: &str = "SELECT event_id, room_id, sender_id, media_ref, mime_type, \
     size_bytes, observed_at, is_image \
     FROM (SELECT *, (substr(mime_type, 1, 6) = 'image/') AS is_image FROM uploads)";

/// Aggregate view of the ledger, for `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub records: u64,
    pub images: u64,
    pub non_images: u64,
    pub total_bytes: u64,
    pub oldest_observed_at: Option<i64>,
}

/// SQLite-backed upload ledger.
pub struct UploadLedger {
    conn: Connection,
}

impl UploadLedger {
    /// Open or create uploads.db with full schema.
    pub fn open_or_create(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let ledger = Self { conn };
        ledger.apply_pragmas()?;
        ledger.apply_schema()?;
        tracing::debug!(path = %db_path.display(), "upload ledger opened");
        Ok(ledger)
    }

    fn apply_pragmas(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            anyhow::bail!(
                "uploads.db schema version {current} is newer than supported ({SCHEMA_VERSION})"
            );
        }
        Ok(())
    }

    fn schema_version(&self) -> anyhow::Result<u32> {
        let version: String = self.conn.query_row(
            "SELECT value FROM schema_meta WHERE key = 'version'",
            [],
            |row| row.get(0),
        )?;
        Ok(version.parse()?)
    }

    /// Insert a record unless its event id is already known.
    /// Returns `true` when a new row was written.
    pub fn upsert(&self, record: &UploadRecord) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO uploads
             (event_id, room_id, sender_id, media_ref, mime_type, size_bytes, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.event_id,
                record.room_id,
                record.sender_id,
                record.media_ref,
                record.mime_type,
                size_to_sql(record.size_bytes),
                record.observed_at,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Remove a record. Deleting an unknown id is not an error.
    pub fn delete(&self, event_id: &str) -> anyhow::Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM uploads WHERE event_id = ?1", params![event_id])?;
        Ok(changed > 0)
    }

    pub fn get(&self, event_id: &str) -> anyhow::Result<Option<UploadRecord>> {
        let sql = format!("{CANDIDATE_SOURCE} WHERE event_id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![event_id], map_record)
            .optional()?;
        Ok(record)
    }

    pub fn count(&self) -> anyhow::Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM uploads", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    pub fn stats(&self) -> anyhow::Result<LedgerStats> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(substr(mime_type, 1, 6) = 'image/'), 0),
                    COALESCE(SUM(size_bytes), 0),
                    MIN(observed_at)
             FROM uploads",
            [],
            |row| {
                let records: i64 = row.get(0)?;
                let images: i64 = row.get(1)?;
                let total_bytes: i64 = row.get(2)?;
                let oldest: Option<i64> = row.get(3)?;
                Ok(LedgerStats {
                    records: records.max(0) as u64,
                    images: images.max(0) as u64,
                    non_images: (records - images).max(0) as u64,
                    total_bytes: total_bytes.max(0) as u64,
                    oldest_observed_at: oldest,
                })
            },
        )?;
        Ok(stats)
    }

    /// Number of records past their class retention window at `now_ms`.
    pub fn count_retention_candidates(&self, policy: &Policy, now_ms: i64) -> anyhow::Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM ({CANDIDATE_SOURCE}) WHERE {}",
            RETENTION_FILTER
        );
        let n: i64 = self.conn.query_row(
            &sql,
            params![
                policy.cutoff_ms(MediaClass::Image, now_ms),
                policy.cutoff_ms(MediaClass::NonImage, now_ms)
            ],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    /// Lazy, ordered candidate sequence for a policy run.
    ///
    /// Non-images always come before images. Within a class, retention orders
    /// oldest first (larger first on ties), pressure orders largest first
    /// (older first on ties). The event id breaks any remaining tie.
    ///
    /// Each page is a fresh keyset query positioned after the last row
    /// yielded, so rows deleted while iterating never shift later pages.
    pub fn select_candidates(&self, policy: &Policy, mode: RunMode, now_ms: i64) -> Candidates<'_> {
        let cutoffs = match mode {
            RunMode::Retention => Some((
                policy.cutoff_ms(MediaClass::Image, now_ms),
                policy.cutoff_ms(MediaClass::NonImage, now_ms),
            )),
            RunMode::Pressure => None,
        };
        Candidates {
            ledger: self,
            mode,
            cutoffs,
            after: None,
            page: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Drop for UploadLedger {
    fn drop(&mut self) {
        let _ = self
            .conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

const RETENTION_FILTER: &str =
    "((is_image = 1 AND observed_at < ?1) OR (is_image = 0 AND observed_at < ?2))";

/// Position of the last yielded row in the run's sort order.
#[derive(Debug, Clone)]
struct SortKey {
    is_image: i64,
    primary: i64,
    secondary: i64,
    event_id: String,
}

impl SortKey {
    fn of(record: &UploadRecord, mode: RunMode) -> Self {
        let is_image = i64::from(record.class() == MediaClass::Image);
        let neg_size = -size_to_sql(record.size_bytes);
        let (primary, secondary) = match mode {
            RunMode::Retention => (record.observed_at, neg_size),
            RunMode::Pressure => (neg_size, record.observed_at),
        };
        Self {
            is_image,
            primary,
            secondary,
            event_id: record.event_id.clone(),
        }
    }
}

fn sort_columns(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Retention => "is_image, observed_at, -size_bytes, event_id",
        RunMode::Pressure => "is_image, -size_bytes, observed_at, event_id",
    }
}

/// Iterator over eviction candidates, fetched a page at a time.
pub struct Candidates<'a> {
    ledger: &'a UploadLedger,
    mode: RunMode,
    cutoffs: Option<(i64, i64)>,
    after: Option<SortKey>,
    page: VecDeque<UploadRecord>,
    exhausted: bool,
}

impl Candidates<'_> {
    fn fetch_page(&mut self) -> anyhow::Result<()> {
        let columns = sort_columns(self.mode);
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some((image_cutoff, non_image_cutoff)) = self.cutoffs {
            clauses.push(RETENTION_FILTER.to_string());
            values.push(Value::Integer(image_cutoff));
            values.push(Value::Integer(non_image_cutoff));
        }
        if let Some(key) = &self.after {
            let base = values.len();
            clauses.push(format!(
                "({columns}) > (?{}, ?{}, ?{}, ?{})",
                base + 1,
                base + 2,
                base + 3,
                base + 4
            ));
            values.push(Value::Integer(key.is_image));
            values.push(Value::Integer(key.primary));
            values.push(Value::Integer(key.secondary));
            values.push(Value::Text(key.event_id.clone()));
        }
        values.push(Value::Integer(PAGE_SIZE));

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM ({CANDIDATE_SOURCE}){filter} ORDER BY {columns} LIMIT ?{}",
            values.len()
        );

        let mut stmt = self.ledger.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_record)?
            .collect::<Result<Vec<_>, _>>()?;

        if (rows.len() as i64) < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.after = Some(SortKey::of(last, self.mode));
        }
        self.page.extend(rows);
        Ok(())
    }
}

impl Iterator for Candidates<'_> {
    type Item = anyhow::Result<UploadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.page.pop_front().map(Ok)
    }
}

fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadRecord> {
    let size: i64 = row.get(5)?;
    Ok(UploadRecord {
        event_id: row.get(0)?,
        room_id: row.get(1)?,
        sender_id: row.get(2)?,
        media_ref: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: size.max(0) as u64,
        observed_at: row.get(6)?,
    })
}
