//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and batch jobs to tell bad input from a crashed run.

use histoseek_core::SearchError;

/// Successful execution.
pub const SUCCESS: u8 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: u8 = 1;

/// Invalid search parameters (workers, top-n, depth, extensions).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: u8 = 64;

/// Cannot read the query image or list the dataset directory.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: u8 = 66;

/// A worker task panicked.
/// Maps to EX_SOFTWARE from sysexits.h.
pub const SOFTWARE_ERROR: u8 = 70;

/// I/O error (cannot write output).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: u8 = 74;

/// Interrupted by Ctrl-C (128 + SIGINT).
pub const CANCELLED: u8 = 130;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: u8,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first search error in the chain, falling back to I/O
        let code = match err.chain().find_map(|e| e.downcast_ref::<SearchError>()) {
            Some(SearchError::InvalidConfig(_)) => USAGE_ERROR,
            Some(SearchError::QueryImage { .. } | SearchError::DatasetUnreadable { .. }) => {
                INPUT_ERROR
            }
            Some(SearchError::WorkerPanicked(_)) => SOFTWARE_ERROR,
            Some(SearchError::Cancelled) => CANCELLED,
            None if err.chain().any(|e| e.is::<std::io::Error>()) => IO_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
