//! Common utility functions shared across CLI commands.

use std::time::Duration;

use histoseek_core::CancelHandle;
use tokio::task::JoinHandle;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

/// Log filter used with `--verbose` when `RUST_LOG` is unset.
const VERBOSE_FILTER: &str = "histoseek_core=debug,histoseek=debug,info";

/// Log filter used otherwise. Per-file warnings are printed by the
/// commands themselves, so the subscriber stays quiet by default.
const DEFAULT_FILTER: &str = "error";

/// Install the global tracing subscriber, writing to stderr.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        })
    });

    fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel `handle` when the process receives Ctrl-C.
///
/// Abort the returned task once the search has finished.
pub fn cancel_on_ctrl_c(handle: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling search");
            eprintln!("Interrupted, waiting for workers to stop...");
            handle.cancel();
        }
    })
}

/// Format one ranked line as `rank: name - Score: score`.
pub fn format_match(rank: usize, name: &str, score: f64) -> String {
    format!("{}: {} - Score: {:.6}", rank, name, score)
}

/// Format a duration as milliseconds with two decimals.
pub fn format_duration(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}
