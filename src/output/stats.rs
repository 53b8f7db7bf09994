//! Statistics over the metadata cache
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::output::traits::OutputResult;
use crate::storage::{MetadataStore, PassRecord};
use chrono::{DateTime, Utc};

/// Number of recent passes included in the report
const RECENT_PASSES: usize = 5;

/// Cache statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Packages with a stored document
    pub total_records: u64,

    /// Packages currently skipped for a permanent reason
    pub total_skips: u64,

    /// Most recent passes, newest first
    pub recent_passes: Vec<PassRecord>,
}

impl StoreStatistics {
    /// The pass currently running or last interrupted, if any
    pub fn resumable_pass(&self) -> Option<&PassRecord> {
        self.recent_passes
            .first()
            .filter(|pass| pass.status.is_resumable())
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The metadata cache to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(store: &dyn MetadataStore) -> OutputResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_records: store.count()?,
        total_skips: store.count_skips()?,
        recent_passes: store.recent_passes(RECENT_PASSES)?,
    })
}

/// Formats statistics as a human-readable report
pub fn format_statistics(stats: &StoreStatistics) -> String {
    let mut out = String::new();

    out.push_str("=== Metadata Cache Statistics ===\n\n");
    out.push_str(&format!("Stored packages: {}\n", stats.total_records));
    out.push_str(&format!("Skipped packages: {}\n\n", stats.total_skips));

    if stats.recent_passes.is_empty() {
        out.push_str("No passes recorded yet\n");
        return out;
    }

    out.push_str("Recent passes:\n");
    for pass in &stats.recent_passes {
        let duration = pass
            .finished_at
            .map(|finished| format_duration(pass.started_at, finished))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!(
            "  #{} {} started {} ({}): {} fetched, {} fresh, {} skipped, {} failed\n",
            pass.id,
            pass.status.to_db_string(),
            pass.started_at.format("%Y-%m-%d %H:%M:%S"),
            duration,
            pass.counts.fetched,
            pass.counts.fresh,
            pass.counts.skipped,
            pass.counts.failed
        ));
    }

    if let Some(pass) = stats.resumable_pass() {
        out.push_str(&format!(
            "\nPass #{} will resume at cursor {}\n",
            pass.id,
            pass.cursor.as_deref().unwrap_or("(first page)")
        ));
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    print!("{}", format_statistics(stats));
}

fn format_duration(started: DateTime<Utc>, finished: DateTime<Utc>) -> String {
    let secs = (finished - started).num_seconds().max(0);
    format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
