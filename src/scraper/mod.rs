//! Perpetual scraper
//!
//! This module contains the harvesting loop, including:
//! - Pass bookkeeping and cursor-based resumption
//! - Freshness and skip-window checks that avoid network calls
//! - Retry with exponential backoff for transient index failures
//! - Extended backoff when the index answers 429

mod backoff;
mod coordinator;

pub use backoff::ExponentialBackoff;
pub use coordinator::{NameOutcome, PassOutcome, PassReport, ScrapeSummary, Scraper};

use crate::config::{compute_config_hash, Config};
use crate::index::PypiIndex;
use crate::limiter::RateLimiter;
use crate::shutdown::Shutdown;
use crate::storage::{MetadataStore, SqliteStore};
use std::sync::Arc;

/// Runs the perpetual scraper against PyPI until `shutdown` is triggered
///
/// Opens (or creates) the metadata cache in `config.cache.dir`, then loops
/// over the index forever.
///
/// # Returns
///
/// * `Ok(ScrapeSummary)` - Totals once the loop stopped
/// * `Err(RotError)` - The cache or the HTTP client could not be set up
pub async fn run_perpetual_scraper(
    config: Config,
    shutdown: Shutdown,
) -> crate::Result<ScrapeSummary> {
    let store = Arc::new(SqliteStore::open(&config.cache.dir)?);
    tracing::info!(
        "Metadata cache at {} holds {} records",
        config.cache.dir.display(),
        store.count()?
    );

    let index = PypiIndex::new(&config.index, &config.user_agent)?;
    // Paced together with any `build` running against the same cache
    let limiter =
        Arc::new(RateLimiter::new(config.limiter.min_interval()).with_ledger(store.clone()));
    let config_hash = compute_config_hash(&config)?;

    let scraper = Scraper::new(
        Arc::new(index),
        store,
        limiter,
        config.scraper.clone(),
        config_hash,
        shutdown,
    );

    Ok(scraper.run().await)
}
