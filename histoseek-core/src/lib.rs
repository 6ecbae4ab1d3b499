//! Histoseek Core - color-histogram similarity search
//!
//! Finds the images in a directory whose color distribution is closest to a
//! query image. Every image is reduced to a normalized color histogram, the
//! dataset is histogrammed in parallel, and results are ranked by histogram
//! intersection with the query.
//!
//! There is no index: each search rescans the whole directory.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use histoseek_core::{SearchConfig, SimilaritySearch};
//!
//! # async fn example() -> histoseek_core::Result<()> {
//! let config = SearchConfig::default().with_workers(4).with_top_n(5);
//! let search = SimilaritySearch::new(&config)?;
//!
//! let outcome = search
//!     .search(Path::new("query.jpg"), Path::new("dataset/"))
//!     .await?;
//!
//! for (rank, m) in outcome.matches.iter().enumerate() {
//!     println!("{}: {} - Score: {:.6}", rank + 1, m.name, m.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod compare;
pub mod config;
pub mod dataset;
pub mod error;
pub mod histogram;
pub mod partition;
pub mod pipeline;
pub mod pool;
pub mod rank;

// Re-export main types for convenience
pub use compare::intersection;
pub use config::{SearchConfig, ValidatedConfig, DEFAULT_TOP_N};
pub use dataset::{list_entries, DatasetEntry, ExtensionFilter, DEFAULT_EXTENSIONS};
pub use error::{ConfigError, ExtractError, Result, SearchError};
pub use histogram::{Histogram, QuantizationDepth, SampleWidth, DEFAULT_DEPTH, MAX_DEPTH};
pub use partition::partition;
pub use pipeline::{SearchObserver, SearchOutcome, SimilaritySearch};
pub use pool::{
    Aggregate, BatchOutput, BatchStats, CancelHandle, ExtractionFailure, WorkerEvent, WorkerPool,
};
pub use rank::{rank, RankedMatch};
