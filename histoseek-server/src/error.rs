//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use histoseek_core::SearchError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request timeout - operation took too long
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Search error from histoseek-core
    #[error("Search error: {0}")]
    Search(#[from] SearchError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Search(ref e) => match e {
                SearchError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                SearchError::QueryImage { .. } | SearchError::DatasetUnreadable { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SearchError::Cancelled => StatusCode::REQUEST_TIMEOUT,
                SearchError::WorkerPanicked(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Search(ref e) => match e {
                SearchError::InvalidConfig(_) => "INVALID_CONFIG",
                SearchError::QueryImage { .. } => "QUERY_UNREADABLE",
                SearchError::DatasetUnreadable { .. } => "DATASET_UNREADABLE",
                SearchError::Cancelled => "CANCELLED",
                SearchError::WorkerPanicked(_) => "WORKER_PANICKED",
            },
        }
    }

    /// Get sanitized error message for client response.
    ///
    /// Filesystem paths stay out of the response; they are only logged.
    fn client_message(&self) -> String {
        match self {
            Self::Search(ref e) => match e {
                SearchError::InvalidConfig(inner) => inner.to_string(),
                SearchError::QueryImage { source, .. } => {
                    format!("Query image could not be read: {}", source)
                }
                SearchError::DatasetUnreadable { source, .. } => {
                    format!("Dataset directory could not be read: {}", source)
                }
                SearchError::Cancelled => "Search cancelled".to_string(),
                SearchError::WorkerPanicked(_) => "Search worker failed".to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Timeout(_) => "timeout",
            Self::Search(_) => "search",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histoseek_core::{ConfigError, ExtractError};
    use std::path::PathBuf;

    #[test]
    fn test_search_error_status_codes() {
        let invalid = ApiError::from(SearchError::from(ConfigError::ZeroWorkers));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.error_code(), "INVALID_CONFIG");

        let query = ApiError::from(SearchError::QueryImage {
            path: PathBuf::from("/srv/images/q.jpg"),
            source: ExtractError::EmptyImage,
        });
        assert_eq!(query.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let cancelled = ApiError::from(SearchError::Cancelled);
        assert_eq!(cancelled.status_code(), StatusCode::REQUEST_TIMEOUT);

        let panicked = ApiError::from(SearchError::WorkerPanicked("boom".into()));
        assert_eq!(panicked.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_client_message_hides_paths() {
        let err = ApiError::from(SearchError::DatasetUnreadable {
            path: PathBuf::from("/srv/images/secret"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        let message = err.client_message();
        assert!(message.starts_with("Dataset directory could not be read"));
        assert!(!message.contains("/srv/images"));
    }

    #[test]
    fn test_timeout_maps_to_408() {
        let err = ApiError::timeout("search exceeded 1s");
        assert_eq!(err.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.error_code(), "TIMEOUT");
    }

    #[test]
    fn test_bad_request_response_status() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
