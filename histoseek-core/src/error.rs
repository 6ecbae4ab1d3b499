use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a single image file into a histogram.
///
/// Inside a batch these are per-item and never abort the run.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to open image: {0}")]
    Open(#[source] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels")]
    EmptyImage,
}

/// Rejected search parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be a positive integer")]
    ZeroWorkers,

    #[error("result count must be a positive integer")]
    ZeroTopN,

    #[error("quantization depth must be between 1 and {max} bits, got {got}")]
    InvalidDepth { got: u8, max: u8 },

    #[error("at least one image extension is required")]
    NoExtensions,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Failed to read query image {path}: {source}")]
    QueryImage {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error("Failed to read dataset directory {path}: {source}")]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Search cancelled")]
    Cancelled,

    #[error("Worker task panicked: {0}")]
    WorkerPanicked(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
