//! Dataset builder - one verification pass over the metadata cache

use crate::dataset::{BuildSummary, CheckedLink, DatasetRow};
use crate::output::RowSink;
use crate::shutdown::Shutdown;
use crate::storage::{MetadataRecord, MetadataStore};
use crate::verifier::{extract_urls, LinkProbe};
use chrono::Utc;
use std::sync::Arc;

/// Compiles the dataset from stored metadata
pub struct DatasetBuilder {
    store: Arc<dyn MetadataStore>,
    probe: Arc<dyn LinkProbe>,
    include_release_history: bool,
    verbose: bool,
    shutdown: Option<Shutdown>,
}

impl DatasetBuilder {
    pub fn new(store: Arc<dyn MetadataStore>, probe: Arc<dyn LinkProbe>) -> Self {
        Self {
            store,
            probe,
            include_release_history: false,
            verbose: false,
            shutdown: None,
        }
    }

    /// Also check URLs found in the per-version release history
    pub fn include_release_history(mut self, include: bool) -> Self {
        self.include_release_history = include;
        self
    }

    /// Log every emitted row at info level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Stop early (after the current package) when `shutdown` triggers
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Runs the build, handing every row to `sink`
    ///
    /// Unreadable records and dead URLs never abort the build; a failing
    /// sink does.
    ///
    /// # Returns
    ///
    /// * `Ok(BuildSummary)` - Totals of the build; the sink has been finished
    /// * `Err(RotError)` - The store could not be traversed or the sink failed
    pub async fn build(&self, sink: &mut dyn RowSink) -> crate::Result<BuildSummary> {
        let mut summary = BuildSummary::default();
        let records = self.store.list_all()?;

        for item in records {
            if self.shutdown.as_ref().is_some_and(Shutdown::is_triggered) {
                tracing::warn!("Build stopped early after {} packages", summary.packages);
                summary.interrupted = true;
                break;
            }

            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping unreadable record: {}", e);
                    summary.unreadable_records += 1;
                    continue;
                }
            };

            let row = self.build_row(&record).await;
            summary.record_row(&row);
            sink.write_row(&row)?;

            if self.verbose {
                tracing::info!(
                    "[{}] {}: {}/{} URLs reachable",
                    summary.packages,
                    row.name,
                    row.reachable_count(),
                    row.links.len()
                );
            } else {
                tracing::debug!(
                    "{}: {}/{} URLs reachable",
                    row.name,
                    row.reachable_count(),
                    row.links.len()
                );
            }
        }

        sink.finish()?;
        Ok(summary)
    }

    /// Extracts and probes the URLs of one record
    pub async fn build_row(&self, record: &MetadataRecord) -> DatasetRow {
        let checked_at = Utc::now();
        let references = extract_urls(&record.document, self.include_release_history);

        let mut links = Vec::with_capacity(references.len());
        for reference in references {
            let verdict = self.probe.check(&reference.url).await;
            if !verdict.reachable {
                tracing::debug!(
                    "{} ({}) of {} is dead: {:?} {:?}",
                    reference.url,
                    reference.role,
                    record.name,
                    verdict.status_code,
                    verdict.error
                );
            }
            links.push(CheckedLink { reference, verdict });
        }

        DatasetRow::from_record(record, links, checked_at)
    }
}
