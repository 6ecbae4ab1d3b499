//! Worker pool and result aggregation.
//!
//! The dataset listing is split into contiguous groups and every group is
//! handed to its own blocking task. Tasks push [`WorkerEvent`]s into a
//! shared unbounded channel; the channel closes once the last task drops its
//! sender, which is the completion barrier the aggregator waits on before
//! the collected histograms are handed to the ranker.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dataset::{DatasetEntry, ExtensionFilter};
use crate::error::{Result, SearchError};
use crate::histogram::{Histogram, QuantizationDepth};
use crate::partition::partition;

/// Shared flag used to abort an in-flight batch.
///
/// Workers check it before each file, so cancellation takes effect after at
/// most one extraction per worker.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every worker holding this handle to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A dataset file that could not be histogrammed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionFailure {
    pub name: String,
    pub cause: String,
}

/// Message sent from a worker to the aggregator.
#[derive(Debug)]
pub enum WorkerEvent {
    Extracted(Histogram),
    Failed(ExtractionFailure),
}

/// Histograms collected from all workers, keyed by image name.
///
/// Iteration follows first-insertion order. Inserting a name that is already
/// present replaces the stored histogram in place.
#[derive(Debug, Default)]
pub struct Aggregate {
    histograms: Vec<Histogram>,
    index: HashMap<String, usize>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a histogram, returning the one it replaced, if any.
    pub fn insert(&mut self, histogram: Histogram) -> Option<Histogram> {
        match self.index.get(histogram.name()) {
            Some(&slot) => Some(std::mem::replace(&mut self.histograms[slot], histogram)),
            None => {
                self.index
                    .insert(histogram.name().to_string(), self.histograms.len());
                self.histograms.push(histogram);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.index.get(name).map(|&slot| &self.histograms[slot])
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Histogram> {
        self.histograms.iter()
    }
}

impl FromIterator<Histogram> for Aggregate {
    fn from_iter<I: IntoIterator<Item = Histogram>>(iter: I) -> Self {
        let mut aggregate = Self::new();
        for histogram in iter {
            aggregate.insert(histogram);
        }
        aggregate
    }
}

/// Counters describing one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// Number of groups the listing was split into (one task each)
    pub partitions: usize,
    /// Distinct images successfully histogrammed (equals the aggregate size)
    pub processed: usize,
    /// Images that failed to open or decode
    pub failed: usize,
    /// Directory entries ignored (directories, other extensions)
    pub skipped: usize,
    /// Wall time from the first spawn to the completion barrier
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// Everything the aggregator holds once the barrier has fired.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub aggregate: Aggregate,
    pub failures: Vec<ExtractionFailure>,
    pub stats: BatchStats,
}

#[derive(Debug, Default)]
struct GroupSummary {
    skipped: usize,
}

/// Runs histogram extraction over a dataset listing.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    depth: QuantizationDepth,
    filter: Arc<ExtensionFilter>,
    cancel: CancelHandle,
}

impl WorkerPool {
    pub fn new(depth: QuantizationDepth, filter: ExtensionFilter, cancel: CancelHandle) -> Self {
        Self {
            depth,
            filter: Arc::new(filter),
            cancel,
        }
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Partition `entries` into at most `workers` groups, extract every
    /// eligible image concurrently and collect the results.
    ///
    /// Per-file failures are reported in [`BatchOutput::failures`] and never
    /// fail the batch. All tasks are joined before this returns, including
    /// on cancellation.
    pub async fn run(
        &self,
        entries: &[DatasetEntry],
        workers: NonZeroUsize,
    ) -> Result<BatchOutput> {
        self.run_with_events(entries, workers, |_| {}).await
    }

    /// Same as [`WorkerPool::run`], calling `on_event` for every event as the
    /// aggregator receives it, before it is stored.
    pub async fn run_with_events<F>(
        &self,
        entries: &[DatasetEntry],
        workers: NonZeroUsize,
        mut on_event: F,
    ) -> Result<BatchOutput>
    where
        F: FnMut(&WorkerEvent),
    {
        let started = Instant::now();
        let groups = partition(entries, workers);
        let partitions = groups.len();

        info!(
            entries = entries.len(),
            workers = workers.get(),
            partitions,
            depth = self.depth.bits(),
            "Starting histogram batch"
        );

        let (sink, mut events) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        for (group_index, group) in groups.into_iter().enumerate() {
            debug!(group = group_index, size = group.len(), "Spawning worker");

            let group = group.to_vec();
            let sink = sink.clone();
            let filter = Arc::clone(&self.filter);
            let cancel = self.cancel.clone();
            let depth = self.depth;

            tasks.spawn_blocking(move || {
                process_group(group_index, group, depth, &filter, &cancel, &sink)
            });
        }
        // Only worker clones remain, so the channel closes when the last task finishes.
        drop(sink);

        let mut output = BatchOutput::default();
        while let Some(event) = events.recv().await {
            on_event(&event);
            match event {
                WorkerEvent::Extracted(histogram) => match output.aggregate.insert(histogram) {
                    None => output.stats.processed += 1,
                    Some(previous) => {
                        warn!(name = previous.name(), "Duplicate image name, keeping latest");
                    }
                },
                WorkerEvent::Failed(failure) => {
                    output.stats.failed += 1;
                    output.failures.push(failure);
                }
            }
        }

        let mut panicked = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(summary) => output.stats.skipped += summary.skipped,
                Err(e) => panicked = Some(e.to_string()),
            }
        }

        output.stats.partitions = partitions;
        output.stats.elapsed = started.elapsed();

        if let Some(message) = panicked {
            return Err(SearchError::WorkerPanicked(message));
        }
        if self.cancel.is_cancelled() {
            info!("Histogram batch cancelled");
            return Err(SearchError::Cancelled);
        }

        info!(
            processed = output.stats.processed,
            failed = output.stats.failed,
            skipped = output.stats.skipped,
            elapsed_ms = output.stats.elapsed.as_millis() as u64,
            "Histogram batch complete"
        );

        Ok(output)
    }
}

fn process_group(
    group_index: usize,
    entries: Vec<DatasetEntry>,
    depth: QuantizationDepth,
    filter: &ExtensionFilter,
    cancel: &CancelHandle,
    sink: &UnboundedSender<WorkerEvent>,
) -> GroupSummary {
    let _span = tracing::debug_span!("worker", group = group_index).entered();
    let mut summary = GroupSummary::default();

    for entry in entries {
        if cancel.is_cancelled() {
            debug!("Cancellation requested, stopping worker");
            break;
        }
        if !filter.accepts(&entry) {
            summary.skipped += 1;
            continue;
        }

        let event = match Histogram::from_path(&entry.path, depth) {
            Ok(histogram) => WorkerEvent::Extracted(histogram),
            Err(e) => {
                warn!(name = %entry.name, error = %e, "Error computing histogram for image");
                WorkerEvent::Failed(ExtractionFailure {
                    name: entry.name,
                    cause: e.to_string(),
                })
            }
        };

        // The receiver only goes away if the aggregating future was dropped.
        if sink.send(event).is_err() {
            break;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::list_entries;
    use crate::histogram::SampleWidth;
    use image::{ImageBuffer, Rgb};
    use std::path::Path;

    fn histogram(name: &str, rgb: [u32; 3]) -> Histogram {
        Histogram::from_rgb_samples(
            name,
            [rgb],
            SampleWidth::Eight,
            QuantizationDepth::default(),
        )
        .unwrap()
    }

    fn write_solid(dir: &Path, name: &str, color: [u8; 3]) {
        ImageBuffer::from_pixel(8, 8, Rgb(color))
            .save(dir.join(name))
            .unwrap();
    }

    fn pool() -> WorkerPool {
        WorkerPool::new(
            QuantizationDepth::default(),
            ExtensionFilter::default(),
            CancelHandle::new(),
        )
    }

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_aggregate_preserves_insertion_order() {
        let aggregate: Aggregate = ["c", "a", "b"]
            .into_iter()
            .map(|n| histogram(n, [0, 0, 0]))
            .collect();
        let names: Vec<&str> = aggregate.iter().map(Histogram::name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_aggregate_duplicate_overwrites_in_place() {
        let mut aggregate = Aggregate::new();
        assert!(aggregate.insert(histogram("a", [0, 0, 0])).is_none());
        assert!(aggregate.insert(histogram("b", [0, 0, 0])).is_none());

        let replaced = aggregate.insert(histogram("a", [255, 255, 255]));
        assert!(replaced.is_some());
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.iter().next().unwrap().name(), "a");
        assert_eq!(aggregate.get("a").unwrap().buckets()[511], 1.0);
    }

    #[test]
    fn test_cancel_handle_shared_between_clones() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_collects_every_image_once() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7u8 {
            write_solid(dir.path(), &format!("img{}.png", i), [i * 30, 0, 0]);
        }
        let entries = list_entries(dir.path()).unwrap();

        let output = pool().run(&entries, workers(3)).await.unwrap();
        assert_eq!(output.stats.partitions, 3);
        assert_eq!(output.stats.processed, 7);
        assert_eq!(output.aggregate.len(), 7);
        assert!(output.failures.is_empty());
    }

    #[tokio::test]
    async fn test_run_skips_directories_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_solid(dir.path(), "keep.png", [1, 2, 3]);
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();
        let entries = list_entries(dir.path()).unwrap();

        let output = pool().run(&entries, workers(2)).await.unwrap();
        assert_eq!(output.stats.processed, 1);
        assert_eq!(output.stats.skipped, 2);
        assert!(output.aggregate.get("keep.png").is_some());
    }

    #[tokio::test]
    async fn test_run_reports_corrupt_file_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        write_solid(dir.path(), "good.png", [9, 9, 9]);
        std::fs::write(dir.path().join("bad.jpg"), b"not a jpeg").unwrap();
        let entries = list_entries(dir.path()).unwrap();

        let output = pool().run(&entries, workers(2)).await.unwrap();
        assert_eq!(output.stats.processed, 1);
        assert_eq!(output.stats.failed, 1);
        assert_eq!(output.failures[0].name, "bad.jpg");
        assert!(!output.failures[0].cause.is_empty());
    }

    #[tokio::test]
    async fn test_run_empty_listing() {
        let output = pool().run(&[], workers(4)).await.unwrap();
        assert_eq!(output.stats.partitions, 0);
        assert!(output.aggregate.is_empty());
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        write_solid(dir.path(), "a.png", [1, 1, 1]);
        let entries = list_entries(dir.path()).unwrap();

        let pool = pool();
        pool.cancel_handle().cancel();

        let err = pool.run(&entries, workers(1)).await.unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));
    }

    #[tokio::test]
    async fn test_run_cancelled_mid_batch_stops_workers() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..40u8 {
            ImageBuffer::from_fn(256, 256, |x, y| Rgb([i, (x % 256) as u8, (y % 256) as u8]))
                .save(dir.path().join(format!("big_{:02}.png", i)))
                .unwrap();
        }
        let entries = list_entries(dir.path()).unwrap();

        let pool = pool();
        let cancel = pool.cancel_handle().clone();
        let mut received = 0;

        let result = pool
            .run_with_events(&entries, workers(1), |event| {
                received += 1;
                if matches!(event, WorkerEvent::Extracted(_)) {
                    cancel.cancel();
                }
            })
            .await;

        assert!(matches!(result, Err(SearchError::Cancelled)));
        assert!(received >= 1);
        assert!(
            received < entries.len(),
            "worker kept going after cancellation: {} of {}",
            received,
            entries.len()
        );
    }

    #[tokio::test]
    async fn test_run_counts_duplicate_names_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("x")).unwrap();
        std::fs::create_dir(dir.path().join("y")).unwrap();
        write_solid(&dir.path().join("x"), "same.png", [0, 0, 0]);
        write_solid(&dir.path().join("y"), "same.png", [255, 255, 255]);

        let entries: Vec<DatasetEntry> = ["x", "y"]
            .into_iter()
            .map(|sub| DatasetEntry {
                name: "same.png".to_string(),
                path: dir.path().join(sub).join("same.png"),
                is_dir: false,
            })
            .collect();

        let output = pool().run(&entries, workers(2)).await.unwrap();
        assert_eq!(output.aggregate.len(), 1);
        assert_eq!(output.stats.processed, 1);
    }

    #[test]
    fn test_batch_stats_serializes_millis() {
        let stats = BatchStats {
            partitions: 2,
            elapsed: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["elapsed_ms"], 1500.0);
        assert_eq!(json["partitions"], 2);
    }
}
