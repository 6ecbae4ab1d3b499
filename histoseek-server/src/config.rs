//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use histoseek_core::config::default_workers;
use histoseek_core::{DEFAULT_DEPTH, DEFAULT_EXTENSIONS, DEFAULT_TOP_N, MAX_DEPTH};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Directory that request paths are resolved against (default: ".")
    pub dataset_root: PathBuf,
    /// Worker count when a request does not name one (default: available parallelism)
    pub default_workers: usize,
    /// Upper bound on per-request worker count (default: 256)
    pub max_workers: usize,
    /// Result count when a request does not name one (default: 5)
    pub default_top_n: usize,
    /// Largest quantization depth a request may ask for (default: 5).
    /// Histogram size grows as 2^(3*depth), and every dataset image's
    /// histogram is held until ranking.
    pub max_depth: u8,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Accepted dataset image extensions (default: jpg, jpeg, png)
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            dataset_root: PathBuf::from("."),
            default_workers: default_workers(),
            max_workers: 256,
            default_top_n: DEFAULT_TOP_N,
            max_depth: 5,
            timeout_secs: 60,
            allowed_origins: None, // None = allow all (dev mode)
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let dataset_root = std::env::var("DATASET_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.dataset_root);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| split_list(&origins));

        let extensions = std::env::var("IMAGE_EXTENSIONS")
            .ok()
            .map(|list| split_list(&list))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.extensions);

        Self {
            port: env_or("PORT", defaults.port),
            host,
            dataset_root,
            default_workers: positive_or(env_or("DEFAULT_WORKERS", 0), defaults.default_workers),
            max_workers: positive_or(env_or("MAX_WORKERS", 0), defaults.max_workers),
            default_top_n: positive_or(env_or("DEFAULT_TOP_N", 0), defaults.default_top_n),
            max_depth: depth_limit_or(env_or("MAX_DEPTH", 0), defaults.max_depth),
            timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            allowed_origins,
            extensions,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

/// Parse `key` from the environment, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// `value` unless it is zero.
fn positive_or(value: usize, default: usize) -> usize {
    if value == 0 {
        default
    } else {
        value
    }
}

/// `value` when it lies in `DEFAULT_DEPTH..=MAX_DEPTH`.
fn depth_limit_or(value: u8, default: u8) -> u8 {
    if (DEFAULT_DEPTH..=MAX_DEPTH).contains(&value) {
        value
    } else {
        default
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
