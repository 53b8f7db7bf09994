//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the MetadataStore
//! trait. Every package is one row and every write is one transaction, so a
//! process killed mid-write loses at most the record being written and a
//! concurrent reader never sees half a record.

use crate::limiter::PermitLedger;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{MetadataStore, RecordIter, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, parse_timestamp, MetadataRecord, PassCounts, PassRecord, PassStatus,
    SkipRecord,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// File name of the database inside the cache directory
pub const DATABASE_FILE: &str = "metadata.sqlite3";

/// How long a writer or reader waits for a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// A stored permit further ahead than this many intervals means the clock stepped back
const MAX_QUEUED_PERMITS: i64 = 16;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens the store in `dir`, creating the directory and database if needed
    ///
    /// # Arguments
    ///
    /// * `dir` - The cache directory
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created store
    /// * `Err(StorageError)` - Failed to create the directory or open the database
    pub fn open(dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open_file(&dir.join(DATABASE_FILE))
    }

    /// Opens the store in `dir`, failing if no database exists there yet
    ///
    /// Used by read-side commands, which have nothing to do on an empty cache.
    pub fn open_existing(dir: &Path) -> StorageResult<Self> {
        let path = dir.join(DATABASE_FILE);
        if !path.is_file() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no metadata cache at {}", path.display()),
            )));
        }
        Self::open_file(&path)
    }

    fn open_file(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets a builder process read while the scraper writes;
        // FULL sync makes every committed put survive a power loss
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (nothing survives the process)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Lists package names in insertion order
    fn list_names(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM packages ORDER BY rowid")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn fetched_at(&self, name: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let fetched_at: Option<String> = conn
            .query_row(
                "SELECT fetched_at FROM packages WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        fetched_at.as_deref().map(parse_timestamp).transpose()
    }
}

/// Pass row as stored, before timestamp parsing
struct RawPass {
    id: i64,
    started_at: String,
    finished_at: Option<String>,
    config_hash: String,
    status: String,
    cursor: Option<String>,
    counts: PassCounts,
}

const PASS_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, cursor, fetched, fresh, skipped, failed";

fn raw_pass(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPass> {
    Ok(RawPass {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: row.get(4)?,
        cursor: row.get(5)?,
        counts: PassCounts {
            fetched: row.get::<_, i64>(6)? as u64,
            fresh: row.get::<_, i64>(7)? as u64,
            skipped: row.get::<_, i64>(8)? as u64,
            failed: row.get::<_, i64>(9)? as u64,
        },
    })
}

impl RawPass {
    fn into_pass(self) -> StorageResult<PassRecord> {
        Ok(PassRecord {
            id: self.id,
            started_at: parse_timestamp(&self.started_at)?,
            finished_at: self.finished_at.as_deref().map(parse_timestamp).transpose()?,
            config_hash: self.config_hash,
            status: PassStatus::from_db_string(&self.status).unwrap_or(PassStatus::Failed),
            cursor: self.cursor,
            counts: self.counts,
        })
    }
}

impl MetadataStore for SqliteStore {
    // ===== Metadata Records =====

    fn get(&self, name: &str) -> StorageResult<Option<MetadataRecord>> {
        let row: Option<(String, String)> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT document, fetched_at FROM packages WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        row.map(|(document, fetched_at)| -> StorageResult<MetadataRecord> {
            Ok(MetadataRecord {
                name: name.to_string(),
                document: serde_json::from_str(&document)?,
                fetched_at: parse_timestamp(&fetched_at)?,
            })
        })
        .transpose()
    }

    fn put(&self, record: &MetadataRecord) -> StorageResult<()> {
        let document = serde_json::to_string(&record.document)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT fetched_at FROM packages WHERE name = ?1",
                params![record.name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(existing) = existing {
            if parse_timestamp(&existing)? > record.fetched_at {
                tracing::debug!(
                    "Ignoring stale write for {} (stored {}, offered {})",
                    record.name,
                    existing,
                    format_timestamp(&record.fetched_at)
                );
                return Ok(());
            }
        }

        tx.execute(
            "INSERT INTO packages (name, document, fetched_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                document = excluded.document,
                fetched_at = excluded.fetched_at",
            params![record.name, document, format_timestamp(&record.fetched_at)],
        )?;

        // A package that can be fetched again is no longer skipped
        tx.execute("DELETE FROM skips WHERE name = ?1", params![record.name])?;

        tx.commit()?;
        Ok(())
    }

    fn list_all(&self) -> StorageResult<RecordIter<'_>> {
        let names = self.list_names()?;

        // Records removed after the snapshot are silently left out
        let records = names
            .into_iter()
            .filter_map(move |name| self.get(&name).transpose());

        Ok(Box::new(records))
    }

    fn contains_fresh_at(
        &self,
        name: &str,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        Ok(self
            .fetched_at(name)?
            .map(|fetched_at| now - fetched_at < max_age)
            .unwrap_or(false))
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Skip Records =====

    fn record_skip(&self, skip: &SkipRecord) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO skips (name, reason, status_code, skipped_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                reason = excluded.reason,
                status_code = excluded.status_code,
                skipped_at = excluded.skipped_at",
            params![
                skip.name,
                skip.reason,
                skip.status_code,
                format_timestamp(&skip.skipped_at)
            ],
        )?;
        Ok(())
    }

    fn recent_skip(
        &self,
        name: &str,
        max_age: chrono::Duration,
    ) -> StorageResult<Option<SkipRecord>> {
        let row: Option<(String, Option<u16>, String)> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT reason, status_code, skipped_at FROM skips WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };

        let Some((reason, status_code, skipped_at)) = row else {
            return Ok(None);
        };

        let skipped_at = parse_timestamp(&skipped_at)?;
        if Utc::now() - skipped_at >= max_age {
            return Ok(None);
        }

        Ok(Some(SkipRecord {
            name: name.to_string(),
            reason,
            status_code,
            skipped_at,
        }))
    }

    fn count_skips(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM skips", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Pass Management =====

    fn begin_pass(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.lock()?;
        let now = format_timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO passes (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, PassStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn resume_pass(&self, pass_id: i64) -> StorageResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE passes SET status = ?1, finished_at = NULL WHERE id = ?2",
            params![PassStatus::Running.to_db_string(), pass_id],
        )?;

        if changed == 0 {
            return Err(StorageError::PassNotFound(pass_id));
        }
        Ok(())
    }

    fn latest_pass(&self) -> StorageResult<Option<PassRecord>> {
        let raw = {
            let conn = self.lock()?;
            conn.query_row(
                &format!("SELECT {} FROM passes ORDER BY id DESC LIMIT 1", PASS_COLUMNS),
                [],
                raw_pass,
            )
            .optional()?
        };

        raw.map(RawPass::into_pass).transpose()
    }

    fn save_cursor(
        &self,
        pass_id: i64,
        cursor: Option<&str>,
        counts: &PassCounts,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE passes SET cursor = ?1, fetched = ?2, fresh = ?3, skipped = ?4, failed = ?5
             WHERE id = ?6",
            params![
                cursor,
                counts.fetched as i64,
                counts.fresh as i64,
                counts.skipped as i64,
                counts.failed as i64,
                pass_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::PassNotFound(pass_id));
        }
        Ok(())
    }

    fn finish_pass(
        &self,
        pass_id: i64,
        status: PassStatus,
        counts: &PassCounts,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        let now = format_timestamp(&Utc::now());
        let changed = conn.execute(
            "UPDATE passes SET status = ?1, finished_at = ?2,
                fetched = ?3, fresh = ?4, skipped = ?5, failed = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                counts.fetched as i64,
                counts.fresh as i64,
                counts.skipped as i64,
                counts.failed as i64,
                pass_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::PassNotFound(pass_id));
        }
        Ok(())
    }

    fn recent_passes(&self, limit: usize) -> StorageResult<Vec<PassRecord>> {
        let raws = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM passes ORDER BY id DESC LIMIT ?1",
                PASS_COLUMNS
            ))?;
            let rows = stmt.query_map(params![limit as i64], raw_pass)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        raws.into_iter().map(RawPass::into_pass).collect()
    }
}

/// Pacing shared by every process that opens the same cache
///
/// The last handed-out slot lives in the `permits` row. It is read and
/// advanced inside an IMMEDIATE transaction, so two processes never receive
/// slots closer than `min_interval`.
impl PermitLedger for SqliteStore {
    fn reserve(&self, min_interval: Duration) -> StorageResult<Duration> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = Utc::now().timestamp_millis();
        let interval = i64::try_from(min_interval.as_millis()).unwrap_or(i64::MAX);
        let last: Option<i64> = tx
            .query_row("SELECT last_permit_ms FROM permits WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let slot = match last {
            Some(last) if last - now > interval.saturating_mul(MAX_QUEUED_PERMITS) => now,
            Some(last) => now.max(last.saturating_add(interval)),
            None => now,
        };

        tx.execute(
            "INSERT INTO permits (id, last_permit_ms) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_permit_ms = excluded.last_permit_ms",
            params![slot],
        )?;
        tx.commit()?;

        Ok(Duration::from_millis((slot - now).max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn record(name: &str, document: serde_json::Value, fetched_at: DateTime<Utc>) -> MetadataRecord {
        MetadataRecord::new(name, document, fetched_at)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("absent").unwrap().is_none());
    }

    #[test]
    fn test_put_then_get() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rec = record("foo", json!({"info": {"version": "1.0"}}), t0());

        store.put(&rec).unwrap();

        assert_eq!(store.get("foo").unwrap(), Some(rec));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put(&record("foo", json!({"v": 1}), t0())).unwrap();
        store
            .put(&record("foo", json!({"v": 2}), t0() + chrono::Duration::hours(1)))
            .unwrap();

        let stored = store.get("foo").unwrap().unwrap();
        assert_eq!(stored.document, json!({"v": 2}));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_older_write_does_not_replace_newer() {
        let store = SqliteStore::open_in_memory().unwrap();
        let newer = record("foo", json!({"v": "new"}), t0());

        store.put(&newer).unwrap();
        store
            .put(&record("foo", json!({"v": "old"}), t0() - chrono::Duration::days(1)))
            .unwrap();

        assert_eq!(store.get("foo").unwrap(), Some(newer));
    }

    #[test]
    fn test_equal_timestamp_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put(&record("foo", json!({"v": 1}), t0())).unwrap();
        store.put(&record("foo", json!({"v": 2}), t0())).unwrap();

        assert_eq!(store.get("foo").unwrap().unwrap().document, json!({"v": 2}));
    }

    #[test]
    fn test_interleaved_puts_reflect_latest_per_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut expected = HashMap::new();

        for step in 0..30i64 {
            let name = format!("pkg-{}", step % 4);
            let rec = record(
                &name,
                json!({"step": step}),
                t0() + chrono::Duration::seconds(step),
            );
            store.put(&rec).unwrap();
            expected.insert(name.clone(), rec);

            // Reads in between never disturb the state
            assert_eq!(store.get(&name).unwrap().as_ref(), expected.get(&name));
        }

        let all: Vec<_> = store
            .list_all()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(all.len(), expected.len());
        for rec in all {
            assert_eq!(Some(&rec), expected.get(&rec.name));
        }
    }

    #[test]
    fn test_list_all_is_restartable() {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["a", "b", "c"] {
            store.put(&record(name, json!({}), t0())).unwrap();
        }

        let first: Vec<String> = store
            .list_all()
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        let second: Vec<String> = store
            .list_all()
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();

        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_all_reads_records_lazily() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(&record("a", json!({"v": 1}), t0())).unwrap();
        store.put(&record("b", json!({"v": 1}), t0())).unwrap();

        let mut iter = store.list_all().unwrap();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.name, "a");

        // Written after the traversal started, observed when reached
        store
            .put(&record("b", json!({"v": 2}), t0() + chrono::Duration::seconds(1)))
            .unwrap();

        let second = iter.next().unwrap().unwrap();
        assert_eq!(second.document, json!({"v": 2}));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_list_all_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.list_all().unwrap().count(), 0);
    }

    #[test]
    fn test_contains_fresh() {
        let store = SqliteStore::open_in_memory().unwrap();
        let max_age = chrono::Duration::days(30);

        assert!(!store.contains_fresh("foo", max_age).unwrap());

        store.put(&record("foo", json!({}), Utc::now())).unwrap();
        assert!(store.contains_fresh("foo", max_age).unwrap());
    }

    #[test]
    fn test_contains_fresh_expires() {
        let store = SqliteStore::open_in_memory().unwrap();
        let max_age = chrono::Duration::days(30);
        store.put(&record("foo", json!({}), t0())).unwrap();

        assert!(store
            .contains_fresh_at("foo", max_age, t0() + chrono::Duration::days(1))
            .unwrap());
        assert!(!store
            .contains_fresh_at(
                "foo",
                max_age,
                t0() + max_age + chrono::Duration::seconds(1)
            )
            .unwrap());
    }

    #[test]
    fn test_skip_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let window = chrono::Duration::days(30);
        let skip = SkipRecord {
            name: "gone".to_string(),
            reason: "not found".to_string(),
            status_code: Some(404),
            skipped_at: Utc::now(),
        };

        store.record_skip(&skip).unwrap();

        let found = store.recent_skip("gone", window).unwrap().unwrap();
        assert_eq!(found.status_code, Some(404));
        assert_eq!(store.count_skips().unwrap(), 1);
        assert!(store.recent_skip("other", window).unwrap().is_none());
    }

    #[test]
    fn test_old_skip_is_ignored() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .record_skip(&SkipRecord {
                name: "gone".to_string(),
                reason: "not found".to_string(),
                status_code: Some(404),
                skipped_at: Utc::now() - chrono::Duration::days(40),
            })
            .unwrap();

        assert!(store
            .recent_skip("gone", chrono::Duration::days(30))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_put_clears_skip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .record_skip(&SkipRecord {
                name: "back".to_string(),
                reason: "not found".to_string(),
                status_code: Some(404),
                skipped_at: Utc::now(),
            })
            .unwrap();

        store.put(&record("back", json!({}), Utc::now())).unwrap();

        assert_eq!(store.count_skips().unwrap(), 0);
    }

    #[test]
    fn test_pass_lifecycle() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.latest_pass().unwrap().is_none());

        let id = store.begin_pass("hash").unwrap();
        let counts = PassCounts {
            fetched: 2,
            fresh: 5,
            skipped: 1,
            failed: 0,
        };
        store.save_cursor(id, Some("page-2"), &counts).unwrap();

        let pass = store.latest_pass().unwrap().unwrap();
        assert_eq!(pass.id, id);
        assert_eq!(pass.status, PassStatus::Running);
        assert_eq!(pass.cursor.as_deref(), Some("page-2"));
        assert_eq!(pass.counts, counts);
        assert!(pass.finished_at.is_none());

        store.finish_pass(id, PassStatus::Completed, &counts).unwrap();

        let pass = store.latest_pass().unwrap().unwrap();
        assert_eq!(pass.status, PassStatus::Completed);
        assert!(pass.finished_at.is_some());
    }

    #[test]
    fn test_resume_interrupted_pass() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.begin_pass("hash").unwrap();
        store.save_cursor(id, Some("page-3"), &PassCounts::default()).unwrap();
        store
            .finish_pass(id, PassStatus::Interrupted, &PassCounts::default())
            .unwrap();

        store.resume_pass(id).unwrap();

        let pass = store.latest_pass().unwrap().unwrap();
        assert_eq!(pass.status, PassStatus::Running);
        assert_eq!(pass.cursor.as_deref(), Some("page-3"));
        assert!(pass.finished_at.is_none());
    }

    #[test]
    fn test_unknown_pass() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.save_cursor(42, None, &PassCounts::default());
        assert!(matches!(result, Err(StorageError::PassNotFound(42))));
    }

    #[test]
    fn test_recent_passes_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.begin_pass("a").unwrap();
        let second = store.begin_pass("b").unwrap();
        let third = store.begin_pass("c").unwrap();

        let passes = store.recent_passes(2).unwrap();
        let ids: Vec<i64> = passes.iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![third, second]);
        assert!(first < second);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let rec = record("foo", json!({"url": "https://example.com"}), t0());

        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store.put(&rec).unwrap();
        }

        let store = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.get("foo").unwrap(), Some(rec));
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = SqliteStore::open(&nested).unwrap();

        assert!(nested.join(DATABASE_FILE).is_file());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_open_existing_requires_database() {
        let dir = TempDir::new().unwrap();
        assert!(SqliteStore::open_existing(dir.path()).is_err());

        SqliteStore::open(dir.path()).unwrap();
        assert!(SqliteStore::open_existing(dir.path()).is_ok());
    }

    #[test]
    fn test_second_connection_sees_committed_writes() {
        let dir = TempDir::new().unwrap();
        let writer = SqliteStore::open(dir.path()).unwrap();
        let reader = SqliteStore::open_existing(dir.path()).unwrap();

        writer.put(&record("foo", json!({"v": 1}), t0())).unwrap();

        let seen = reader.get("foo").unwrap().unwrap();
        assert_eq!(seen.document, json!({"v": 1}));
    }

    #[test]
    fn test_permit_reservations_are_spaced() {
        let store = SqliteStore::open_in_memory().unwrap();
        let interval = Duration::from_secs(10);

        assert_eq!(store.reserve(interval).unwrap(), Duration::ZERO);
        let wait = store.reserve(interval).unwrap();

        assert!(wait > Duration::from_secs(9));
        assert!(wait <= interval);
    }

    #[test]
    fn test_permits_shared_between_connections() {
        let dir = TempDir::new().unwrap();
        let scraper = SqliteStore::open(dir.path()).unwrap();
        let builder = SqliteStore::open_existing(dir.path()).unwrap();
        let interval = Duration::from_secs(10);

        assert_eq!(scraper.reserve(interval).unwrap(), Duration::ZERO);
        let wait = builder.reserve(interval).unwrap();

        assert!(wait > Duration::from_secs(9));
    }

    #[test]
    fn test_stale_future_permit_is_reset() {
        let store = SqliteStore::open_in_memory().unwrap();
        let far_future = Utc::now().timestamp_millis() + 86_400_000;
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO permits (id, last_permit_ms) VALUES (1, ?1)",
                params![far_future],
            )
            .unwrap();

        assert_eq!(store.reserve(Duration::from_secs(1)).unwrap(), Duration::ZERO);
    }
}
