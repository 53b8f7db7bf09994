//! Scraper coordinator - the perpetual harvesting loop
//!
//! One pass enumerates the whole index page by page. For each name the
//! scraper either skips it (fresh cache entry or recent permanent skip) or
//! fetches its metadata document through the shared rate limiter and stores
//! it. The page cursor and running tallies are persisted after each page so
//! an interrupted pass resumes where it left off.

use crate::config::ScraperConfig;
use crate::index::{FetchError, NamePage, PackageIndex};
use crate::limiter::RateLimiter;
use crate::scraper::ExponentialBackoff;
use crate::shutdown::Shutdown;
use crate::storage::{
    MetadataRecord, MetadataStore, PassCounts, PassStatus, SkipRecord, StorageResult,
};
use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Log progress every this many names
const PROGRESS_INTERVAL: u64 = 100;

/// How a pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The whole listing was processed
    Completed,
    /// A stop was requested; the cursor was kept for resumption
    Interrupted,
    /// The listing could not be fetched
    Failed,
}

/// Result of one pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: i64,
    pub outcome: PassOutcome,
    pub counts: PassCounts,
}

/// What happened to a single name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOutcome {
    /// Document fetched and stored
    Fetched,
    /// Cache entry or skip record still fresh; no network call made
    Fresh,
    /// Given up on for this pass
    Skipped,
    /// Document fetched but could not be stored
    Failed,
    /// A stop arrived while waiting to retry
    Interrupted,
}

/// Totals over the lifetime of [`Scraper::run`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeSummary {
    pub passes_completed: u64,
    pub counts: PassCounts,
}

/// The perpetual scraper
pub struct Scraper {
    index: Arc<dyn PackageIndex>,
    store: Arc<dyn MetadataStore>,
    limiter: Arc<RateLimiter>,
    config: ScraperConfig,
    backoff: ExponentialBackoff,
    config_hash: String,
    shutdown: Shutdown,
}

impl Scraper {
    /// Creates a scraper
    ///
    /// # Arguments
    ///
    /// * `index` - Where names and documents come from
    /// * `store` - Where documents go
    /// * `limiter` - Pacing shared with every other outbound flow
    /// * `config` - Freshness, retry and idle settings
    /// * `config_hash` - Recorded with every pass this scraper starts
    /// * `shutdown` - Stop signal checked between iterations
    pub fn new(
        index: Arc<dyn PackageIndex>,
        store: Arc<dyn MetadataStore>,
        limiter: Arc<RateLimiter>,
        config: ScraperConfig,
        config_hash: impl Into<String>,
        shutdown: Shutdown,
    ) -> Self {
        let backoff = ExponentialBackoff::new(config.backoff_base_ms, config.backoff_max_ms)
            .with_rate_limited_max(config.rate_limited_max_ms);
        Self {
            index,
            store,
            limiter,
            config,
            backoff,
            config_hash: config_hash.into(),
            shutdown,
        }
    }

    /// Runs passes until a stop is requested
    ///
    /// Never fails: storage trouble with pass bookkeeping is logged and the
    /// pass is retried after a backoff.
    pub async fn run(&self) -> ScrapeSummary {
        let mut summary = ScrapeSummary::default();

        while !self.shutdown.is_triggered() {
            let report = match self.run_pass().await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("Pass bookkeeping failed: {}", e);
                    if self.shutdown.sleep(self.backoff.max_delay()).await {
                        break;
                    }
                    continue;
                }
            };

            summary.counts.add(&report.counts);

            match report.outcome {
                PassOutcome::Completed => {
                    summary.passes_completed += 1;
                    tracing::info!(
                        "Pass {} completed: {} fetched, {} fresh, {} skipped, {} failed",
                        report.pass_id,
                        report.counts.fetched,
                        report.counts.fresh,
                        report.counts.skipped,
                        report.counts.failed
                    );

                    let idle = self.config.idle_between_passes();
                    if !idle.is_zero() {
                        tracing::info!("Idling {:?} before the next pass", idle);
                        if self.shutdown.sleep(idle).await {
                            break;
                        }
                    }
                }
                PassOutcome::Interrupted => break,
                PassOutcome::Failed => {
                    tracing::warn!(
                        "Pass {} failed, starting over after {:?}",
                        report.pass_id,
                        self.backoff.max_delay()
                    );
                    if self.shutdown.sleep(self.backoff.max_delay()).await {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "Scraper stopped after {} completed passes",
            summary.passes_completed
        );
        summary
    }

    /// Runs (or resumes) a single pass over the listing
    pub async fn run_pass(&self) -> StorageResult<PassReport> {
        let (pass_id, mut cursor, mut counts) = self.begin_or_resume()?;

        loop {
            if self.shutdown.is_triggered() {
                return self.finish(pass_id, PassOutcome::Interrupted, counts);
            }

            let page = match self.fetch_page(cursor.as_deref()).await {
                Ok(Some(page)) => page,
                Ok(None) => return self.finish(pass_id, PassOutcome::Interrupted, counts),
                Err(e) => {
                    tracing::error!("Listing failed at cursor {:?}: {}", cursor, e);
                    return self.finish(pass_id, PassOutcome::Failed, counts);
                }
            };

            tracing::debug!(
                "Pass {}: processing page of {} names",
                pass_id,
                page.names.len()
            );

            for name in &page.names {
                if self.shutdown.is_triggered() {
                    self.store.save_cursor(pass_id, cursor.as_deref(), &counts)?;
                    return self.finish(pass_id, PassOutcome::Interrupted, counts);
                }

                match self.process_name(name).await {
                    NameOutcome::Fetched => counts.fetched += 1,
                    NameOutcome::Fresh => counts.fresh += 1,
                    NameOutcome::Skipped => counts.skipped += 1,
                    NameOutcome::Failed => counts.failed += 1,
                    NameOutcome::Interrupted => {
                        self.store.save_cursor(pass_id, cursor.as_deref(), &counts)?;
                        return self.finish(pass_id, PassOutcome::Interrupted, counts);
                    }
                }

                if counts.total() % PROGRESS_INTERVAL == 0 {
                    tracing::info!(
                        "Progress: {} names seen in pass {} ({} fetched)",
                        counts.total(),
                        pass_id,
                        counts.fetched
                    );
                }
            }

            cursor = page.next_cursor;
            self.store.save_cursor(pass_id, cursor.as_deref(), &counts)?;

            if cursor.is_none() {
                return self.finish(pass_id, PassOutcome::Completed, counts);
            }
        }
    }

    /// Handles one package name
    pub async fn process_name(&self, name: &str) -> NameOutcome {
        match self.store.contains_fresh(name, self.config.freshness()) {
            Ok(true) => return NameOutcome::Fresh,
            Ok(false) => {}
            Err(e) => tracing::warn!("Cache lookup failed for {}: {}", name, e),
        }

        match self.store.recent_skip(name, self.config.skip_window()) {
            Ok(Some(skip)) => {
                tracing::debug!("Skipping {} ({} at {})", name, skip.reason, skip.skipped_at);
                return NameOutcome::Fresh;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Skip lookup failed for {}: {}", name, e),
        }

        let document = match self
            .with_retry(name, || self.index.fetch_metadata(name))
            .await
        {
            Ok(Some(document)) => document,
            Ok(None) => return NameOutcome::Interrupted,
            Err(e) if e.is_retryable() => {
                tracing::warn!("Giving up on {} for this pass: {}", name, e);
                return NameOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", name, e);
                self.record_skip(name, &e);
                return NameOutcome::Skipped;
            }
        };

        self.store_document(name, document)
    }

    fn begin_or_resume(&self) -> StorageResult<(i64, Option<String>, PassCounts)> {
        if let Some(pass) = self.store.latest_pass()? {
            if pass.status.is_resumable() {
                if pass.config_hash != self.config_hash {
                    tracing::info!(
                        "Configuration changed since pass {} started; resuming anyway",
                        pass.id
                    );
                }
                tracing::info!(
                    "Resuming pass {} at cursor {:?} ({} names already seen)",
                    pass.id,
                    pass.cursor,
                    pass.counts.total()
                );
                self.store.resume_pass(pass.id)?;
                return Ok((pass.id, pass.cursor, pass.counts));
            }
        }

        let pass_id = self.store.begin_pass(&self.config_hash)?;
        tracing::info!("Starting pass {}", pass_id);
        Ok((pass_id, None, PassCounts::default()))
    }

    fn finish(
        &self,
        pass_id: i64,
        outcome: PassOutcome,
        counts: PassCounts,
    ) -> StorageResult<PassReport> {
        let status = match outcome {
            PassOutcome::Completed => PassStatus::Completed,
            PassOutcome::Interrupted => PassStatus::Interrupted,
            PassOutcome::Failed => PassStatus::Failed,
        };
        self.store.finish_pass(pass_id, status, &counts)?;

        if outcome == PassOutcome::Interrupted {
            tracing::info!("Pass {} interrupted; it will resume on restart", pass_id);
        }

        Ok(PassReport {
            pass_id,
            outcome,
            counts,
        })
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Option<NamePage>, FetchError> {
        self.with_retry("listing", || self.index.list_page(cursor))
            .await
    }

    /// Calls `op` through the limiter, retrying transient failures
    ///
    /// Returns `Ok(None)` if a stop arrived during a backoff sleep.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<Option<T>, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            let err = match op().await {
                Ok(value) => return Ok(Some(value)),
                Err(e) => e,
            };

            attempt += 1;
            if !err.is_retryable() || attempt >= self.config.max_attempts {
                return Err(err);
            }

            let delay = match &err {
                FetchError::RateLimited { retry_after, .. } => self.backoff.rate_limited_delay(
                    attempt - 1,
                    self.config.rate_limited_multiplier,
                    *retry_after,
                ),
                _ => self.backoff.delay(attempt - 1),
            };

            tracing::debug!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt,
                self.config.max_attempts,
                what,
                err,
                delay
            );

            if self.shutdown.sleep(delay).await {
                return Ok(None);
            }
        }
    }

    fn record_skip(&self, name: &str, err: &FetchError) {
        let skip = SkipRecord {
            name: name.to_string(),
            reason: err.kind().to_string(),
            status_code: err.status_code(),
            skipped_at: Utc::now(),
        };

        if let Err(e) = self.store.record_skip(&skip) {
            tracing::error!("Failed to record skip for {}: {}", name, e);
        }
    }

    fn store_document(&self, name: &str, document: Value) -> NameOutcome {
        let record = MetadataRecord::new(name, document, Utc::now());

        if let Err(first) = self.store.put(&record) {
            tracing::warn!("Storing {} failed, retrying once: {}", name, first);
            if let Err(e) = self.store.put(&record) {
                tracing::error!("Dropping document for {}: {}", name, e);
                return NameOutcome::Failed;
            }
        }

        tracing::debug!("Stored {}", name);
        NameOutcome::Fetched
    }
}
