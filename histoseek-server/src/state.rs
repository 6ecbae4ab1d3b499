//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration (dataset root, worker limits, defaults)
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
