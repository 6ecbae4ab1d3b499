//! Similarity search handler
//!
//! Handles POST /search requests: histogram a query image and rank the images
//! of a dataset directory against it. Both paths live under the configured
//! dataset root.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use histoseek_core::{BatchStats, CancelHandle, ExtractionFailure, SearchConfig, SimilaritySearch};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for a similarity search.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Query image, relative to the dataset root
    pub query: String,
    /// Dataset directory, relative to the dataset root
    pub dataset: String,
    /// Number of parallel workers (default: server setting, capped at `MAX_WORKERS`)
    #[serde(default)]
    pub workers: Option<usize>,
    /// Number of matches to return (default: server setting)
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Bits per color channel (default: 3, capped at `MAX_DEPTH`)
    #[serde(default)]
    pub depth: Option<u8>,
}

/// Response for a similarity search.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Number of matches returned
    pub count: usize,
    /// Matches sorted by score, best first
    pub matches: Vec<MatchEntry>,
    /// Dataset files that could not be histogrammed
    pub failures: Vec<ExtractionFailure>,
    pub stats: BatchStats,
}

/// A single ranked match.
#[derive(Debug, Serialize)]
pub struct MatchEntry {
    /// 1-based position in the ranking
    pub rank: usize,
    pub name: String,
    /// Histogram intersection with the query, in [0, 1]
    pub score: f64,
}

/// Cancels the search workers when the request future is dropped,
/// for example when the request times out or the client disconnects.
struct CancelOnDrop(CancelHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Resolve a client-supplied path under `root`.
///
/// Only plain relative paths are accepted: absolute paths, drive prefixes and
/// `..` components are rejected.
pub fn resolve_under(root: &Path, field: &str, raw: &str) -> Result<PathBuf, ApiError> {
    let relative = Path::new(raw);
    if raw.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} must not be empty", field)));
    }

    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(ApiError::bad_request(format!(
                    "{} must not contain '..'",
                    field
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ApiError::bad_request(format!(
                    "{} must be relative to the dataset root",
                    field
                )));
            }
        }
    }

    Ok(root.join(relative))
}

/// POST /search - rank dataset images by color similarity to a query image
pub async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;
    let config = &state.config;

    let query_path = resolve_under(&config.dataset_root, "query", &request.query)?;
    let dataset_path = resolve_under(&config.dataset_root, "dataset", &request.dataset)?;

    let workers = request
        .workers
        .unwrap_or(config.default_workers)
        .min(config.max_workers);

    let mut search_config = SearchConfig::default()
        .with_workers(workers)
        .with_top_n(request.top_n.unwrap_or(config.default_top_n))
        .with_extensions(config.extensions.iter().cloned());
    if let Some(depth) = request.depth {
        if depth > config.max_depth {
            return Err(ApiError::bad_request(format!(
                "depth {} exceeds the server limit of {}",
                depth, config.max_depth
            )));
        }
        search_config = search_config.with_depth(depth);
    }

    let search = SimilaritySearch::new(&search_config)?;
    let _guard = CancelOnDrop(search.cancel_handle());

    let timeout = Duration::from_secs(config.timeout_secs);
    let outcome = tokio::time::timeout(timeout, search.search(&query_path, &dataset_path))
        .await
        .map_err(|_| {
            ApiError::timeout(format!("search exceeded {}s", config.timeout_secs))
        })??;

    info!(
        query = %request.query,
        dataset = %request.dataset,
        workers = workers,
        matches = outcome.matches.len(),
        failures = outcome.failures.len(),
        elapsed_ms = outcome.stats.elapsed.as_millis() as u64,
        "Search served"
    );

    let matches: Vec<MatchEntry> = outcome
        .matches
        .into_iter()
        .enumerate()
        .map(|(i, m)| MatchEntry {
            rank: i + 1,
            name: m.name,
            score: m.score,
        })
        .collect();

    Ok(Json(SearchResponse {
        count: matches.len(),
        matches,
        failures: outcome.failures,
        stats: outcome.stats,
    }))
}
