//! End-to-end similarity search.
//!
//! [`SimilaritySearch`] ties the pieces together: it histograms the query
//! once, lists the dataset directory, runs the [`WorkerPool`] over the
//! listing and ranks the aggregate against the query.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::config::{SearchConfig, ValidatedConfig};
use crate::dataset::{list_entries, DatasetEntry};
use crate::error::{Result, SearchError};
use crate::histogram::Histogram;
use crate::pool::{BatchStats, CancelHandle, ExtractionFailure, WorkerEvent, WorkerPool};
use crate::rank::{rank, RankedMatch};

/// Hook around the batch run, for timing and progress reporting.
///
/// All methods default to no-ops.
pub trait SearchObserver: Send + Sync {
    /// Called right before workers are spawned.
    fn on_batch_start(&self, _entries: usize, _workers: NonZeroUsize) {}

    /// Called once per dataset file that could not be histogrammed, while
    /// the batch is still running.
    fn on_failure(&self, _failure: &ExtractionFailure) {}

    /// Called after the completion barrier, before ranking.
    fn on_batch_complete(&self, _stats: &BatchStats) {}
}

/// Result of one search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Name of the query image
    pub query: String,
    /// Best matches, highest score first
    pub matches: Vec<RankedMatch>,
    /// Dataset files that were excluded because extraction failed
    pub failures: Vec<ExtractionFailure>,
    pub stats: BatchStats,
}

/// A configured similarity search.
#[derive(Clone)]
pub struct SimilaritySearch {
    config: ValidatedConfig,
    cancel: CancelHandle,
    observer: Option<Arc<dyn SearchObserver>>,
}

impl std::fmt::Debug for SimilaritySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilaritySearch")
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

impl SimilaritySearch {
    /// Validate `config` and build a search from it.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self::from_validated(config.validate()?))
    }

    pub fn from_validated(config: ValidatedConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::new(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Use an externally owned cancel handle.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that aborts any batch this search is running.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Histogram `query_path` and rank the images in `dataset_dir` against it.
    #[instrument(skip_all, fields(query = %query_path.display(), dataset = %dataset_dir.display()))]
    pub async fn search(&self, query_path: &Path, dataset_dir: &Path) -> Result<SearchOutcome> {
        let query = self.query_histogram(query_path).await?;
        let entries = self.list_dataset(dataset_dir).await?;
        self.run(&query, &entries).await
    }

    /// Histogram the query image. Any failure here is fatal for the search.
    pub async fn query_histogram(&self, path: &Path) -> Result<Histogram> {
        let owned = path.to_path_buf();
        let depth = self.config.depth;

        let histogram = tokio::task::spawn_blocking(move || Histogram::from_path(&owned, depth))
            .await
            .map_err(|e| SearchError::WorkerPanicked(e.to_string()))?
            .map_err(|source| SearchError::QueryImage {
                path: path.to_path_buf(),
                source,
            })?;

        info!(name = histogram.name(), buckets = histogram.len(), "Computed query histogram");
        Ok(histogram)
    }

    /// List the dataset directory. Failure to list it is fatal for the search.
    pub async fn list_dataset(&self, dir: &Path) -> Result<Vec<DatasetEntry>> {
        let owned = dir.to_path_buf();

        tokio::task::spawn_blocking(move || list_entries(&owned))
            .await
            .map_err(|e| SearchError::WorkerPanicked(e.to_string()))?
            .map_err(|source| SearchError::DatasetUnreadable {
                path: dir.to_path_buf(),
                source,
            })
    }

    /// Run the batch with the configured worker count and rank the result.
    pub async fn run(&self, query: &Histogram, entries: &[DatasetEntry]) -> Result<SearchOutcome> {
        self.run_with_workers(query, entries, self.config.workers)
            .await
    }

    /// Run the batch with an explicit worker count and rank the result.
    pub async fn run_with_workers(
        &self,
        query: &Histogram,
        entries: &[DatasetEntry],
        workers: NonZeroUsize,
    ) -> Result<SearchOutcome> {
        if self.cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let pool = WorkerPool::new(
            self.config.depth,
            self.config.extensions.clone(),
            self.cancel.clone(),
        );

        if let Some(observer) = &self.observer {
            observer.on_batch_start(entries.len(), workers);
        }

        let observer = self.observer.as_deref();
        let batch = pool
            .run_with_events(entries, workers, |event| {
                if let (Some(observer), WorkerEvent::Failed(failure)) = (observer, event) {
                    observer.on_failure(failure);
                }
            })
            .await?;

        if let Some(observer) = observer {
            observer.on_batch_complete(&batch.stats);
        }

        let matches = rank(query, &batch.aggregate, self.config.top_n);

        Ok(SearchOutcome {
            query: query.name().to_string(),
            matches,
            failures: batch.failures,
            stats: batch.stats,
        })
    }
}
