//! Storage traits and error types
//!
//! This module defines the trait interface for the metadata cache and
//! associated error types.

use crate::storage::{MetadataRecord, PassCounts, PassRecord, PassStatus, SkipRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Pass not found: {0}")]
    PassNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Lazily produced records of one traversal
pub type RecordIter<'a> = Box<dyn Iterator<Item = StorageResult<MetadataRecord>> + Send + 'a>;

/// Trait for metadata cache implementations
///
/// All methods take `&self`; implementations provide their own interior
/// synchronization so one store can be shared between tasks.
pub trait MetadataStore: Send + Sync {
    // ===== Metadata Records =====

    /// Looks up the record for a package
    fn get(&self, name: &str) -> StorageResult<Option<MetadataRecord>>;

    /// Stores a record, replacing any previous record for the same name
    ///
    /// The record is on stable storage once this returns. A record older than
    /// the stored one is ignored so `fetched_at` never goes backwards.
    fn put(&self, record: &MetadataRecord) -> StorageResult<()>;

    /// Produces every stored record, in unspecified order
    ///
    /// Each call starts an independent traversal. Names are snapshotted when
    /// the call is made and each record is read when the iterator reaches it.
    fn list_all(&self) -> StorageResult<RecordIter<'_>>;

    /// Whether a record exists for `name` that is younger than `max_age`
    fn contains_fresh(&self, name: &str, max_age: chrono::Duration) -> StorageResult<bool> {
        self.contains_fresh_at(name, max_age, Utc::now())
    }

    /// Same as [`MetadataStore::contains_fresh`], evaluated at `now`
    fn contains_fresh_at(
        &self,
        name: &str,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Counts stored records
    fn count(&self) -> StorageResult<u64>;

    // ===== Skip Records =====

    /// Records that a package was skipped for a permanent reason
    fn record_skip(&self, skip: &SkipRecord) -> StorageResult<()>;

    /// Returns the skip record for `name` if it is younger than `max_age`
    fn recent_skip(
        &self,
        name: &str,
        max_age: chrono::Duration,
    ) -> StorageResult<Option<SkipRecord>>;

    /// Counts skip records
    fn count_skips(&self) -> StorageResult<u64>;

    // ===== Pass Management =====

    /// Starts a new scrape pass
    ///
    /// # Returns
    ///
    /// The ID of the newly created pass
    fn begin_pass(&self, config_hash: &str) -> StorageResult<i64>;

    /// Marks an unfinished pass as running again
    fn resume_pass(&self, pass_id: i64) -> StorageResult<()>;

    /// Gets the most recent pass
    fn latest_pass(&self) -> StorageResult<Option<PassRecord>>;

    /// Persists the listing cursor and running tallies of a pass
    fn save_cursor(
        &self,
        pass_id: i64,
        cursor: Option<&str>,
        counts: &PassCounts,
    ) -> StorageResult<()>;

    /// Marks a pass as finished with the given status
    fn finish_pass(&self, pass_id: i64, status: PassStatus, counts: &PassCounts)
        -> StorageResult<()>;

    /// Gets the most recent passes, newest first
    fn recent_passes(&self, limit: usize) -> StorageResult<Vec<PassRecord>>;
}
