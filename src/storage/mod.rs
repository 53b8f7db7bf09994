//! Storage module for the durable metadata cache
//!
//! This module handles all persistence for the harvester, including:
//! - SQLite database initialization and schema management
//! - One row per package holding the newest metadata document
//! - Permanent skip records (removed packages, malformed documents)
//! - Scrape pass tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteStore, DATABASE_FILE};
pub use traits::{MetadataStore, RecordIter, StorageError, StorageResult};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// The newest metadata document captured for one package
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// Package name as listed by the index
    pub name: String,

    /// The document exactly as returned by the index
    pub document: Value,

    /// When the document was fetched
    pub fetched_at: DateTime<Utc>,
}

impl MetadataRecord {
    pub fn new(name: impl Into<String>, document: Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            document,
            fetched_at,
        }
    }

    /// Whether this record is younger than `max_age` at `now`
    pub fn is_fresh_at(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < max_age
    }
}

/// A package the scraper gave up on without a retry in the current window
#[derive(Debug, Clone, PartialEq)]
pub struct SkipRecord {
    pub name: String,
    pub reason: String,
    pub status_code: Option<u16>,
    pub skipped_at: DateTime<Utc>,
}

/// One full enumeration of the index by the scraper
#[derive(Debug, Clone)]
pub struct PassRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    pub status: PassStatus,

    /// Listing cursor of the next page to process; `None` means the first page
    pub cursor: Option<String>,

    pub counts: PassCounts,
}

/// Per-pass outcome tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounts {
    /// Documents fetched and stored
    pub fetched: u64,

    /// Names skipped because their cache entry (or skip record) was fresh
    pub fresh: u64,

    /// Names given up on (permanent errors, exhausted retries)
    pub skipped: u64,

    /// Documents fetched but not stored
    pub failed: u64,
}

impl PassCounts {
    pub fn total(&self) -> u64 {
        self.fetched + self.fresh + self.skipped + self.failed
    }

    pub fn add(&mut self, other: &PassCounts) {
        self.fetched += other.fetched;
        self.fresh += other.fresh;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Status of a scrape pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl PassStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether a pass in this status should be picked up again on restart
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}

/// Formats a timestamp for storage
///
/// Fixed-width RFC 3339 in UTC, so stored values also sort lexicographically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp
pub(crate) fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", s, e)))
}
