//! Search parameters.
//!
//! [`SearchConfig`] is the loose, caller-facing form (CLI flags, JSON
//! requests). [`SearchConfig::validate`] checks it once at the pipeline
//! boundary and produces a [`ValidatedConfig`] whose fields cannot hold an
//! invalid value.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::dataset::{ExtensionFilter, DEFAULT_EXTENSIONS};
use crate::error::ConfigError;
use crate::histogram::{QuantizationDepth, DEFAULT_DEPTH};

/// Number of matches reported when none is requested.
pub const DEFAULT_TOP_N: usize = 5;

/// Default worker count: one per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Unvalidated search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of dataset partitions, one worker task each (default: cores)
    pub workers: usize,
    /// Number of ranked matches to keep (default: 5)
    pub top_n: usize,
    /// Bits kept per color channel (default: 3)
    pub depth: u8,
    /// Accepted image extensions (default: jpg, jpeg, png)
    pub extensions: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            top_n: DEFAULT_TOP_N,
            depth: DEFAULT_DEPTH,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl SearchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        Ok(ValidatedConfig {
            workers: NonZeroUsize::new(self.workers).ok_or(ConfigError::ZeroWorkers)?,
            top_n: NonZeroUsize::new(self.top_n).ok_or(ConfigError::ZeroTopN)?,
            depth: QuantizationDepth::new(self.depth)?,
            extensions: ExtensionFilter::new(&self.extensions)?,
        })
    }
}

/// Search configuration that has passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub workers: NonZeroUsize,
    pub top_n: NonZeroUsize,
    pub depth: QuantizationDepth,
    pub extensions: ExtensionFilter,
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        Self {
            workers: NonZeroUsize::new(default_workers()).unwrap_or(NonZeroUsize::MIN),
            top_n: NonZeroUsize::new(DEFAULT_TOP_N).unwrap_or(NonZeroUsize::MIN),
            depth: QuantizationDepth::default(),
            extensions: ExtensionFilter::default(),
        }
    }
}
