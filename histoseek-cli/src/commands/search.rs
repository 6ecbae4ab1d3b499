//! Search command implementation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use histoseek_core::{
    ExtractionFailure, SearchConfig, SearchObserver, SearchOutcome, SimilaritySearch,
};
use tracing::{debug, info};

use crate::utils::{cancel_on_ctrl_c, format_duration, format_match};

/// Output switches for the search command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Prints a warning line for every dataset file that failed to decode.
struct WarningPrinter;

impl SearchObserver for WarningPrinter {
    fn on_failure(&self, failure: &ExtractionFailure) {
        eprintln!(
            "{} skipped {}: {}",
            "warning:".yellow().bold(),
            failure.name,
            failure.cause
        );
    }
}

/// Execute the search command.
pub async fn execute(
    query: PathBuf,
    dataset: PathBuf,
    config: SearchConfig,
    options: SearchOptions,
) -> Result<()> {
    let mut search = SimilaritySearch::new(&config).context("Invalid search parameters")?;
    if !options.quiet {
        search = search.with_observer(Arc::new(WarningPrinter));
    }
    debug!(config = ?search.config(), "Validated search config");

    if !options.quiet && !options.json {
        println!("Finding similarity with K={}", config.workers);
    }

    let interrupt = cancel_on_ctrl_c(search.cancel_handle());
    let result = search.search(&query, &dataset).await;
    interrupt.abort();
    let outcome = result.context("Search failed")?;

    info!(
        query = %outcome.query,
        matches = outcome.matches.len(),
        failures = outcome.failures.len(),
        "Search complete"
    );

    if options.json {
        let json =
            serde_json::to_string_pretty(&outcome).context("Failed to serialize result to JSON")?;
        writeln!(std::io::stdout().lock(), "{}", json).context("Failed to write output")?;
        return Ok(());
    }

    print_ranking(&outcome, config.top_n, options.quiet).context("Failed to write output")
}

fn print_ranking(outcome: &SearchOutcome, top_n: usize, quiet: bool) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();

    if !quiet {
        writeln!(out, "{}", format!("Top {} similar images:", top_n).bold())?;
        if outcome.matches.is_empty() {
            writeln!(out, "   {}", "No images found in dataset".dimmed())?;
        }
    }

    for (i, m) in outcome.matches.iter().enumerate() {
        let line = format_match(i + 1, &m.name, m.score);
        if i == 0 && !quiet {
            writeln!(out, "{}", line.green())?;
        } else {
            writeln!(out, "{}", line)?;
        }
    }

    if !quiet {
        let stats = &outcome.stats;
        writeln!(out)?;
        writeln!(
            out,
            "   {} {} images in {} partitions ({} failed, {} skipped) in {}",
            "Processed".dimmed(),
            stats.processed,
            stats.partitions,
            stats.failed,
            stats.skipped,
            format_duration(stats.elapsed)
        )?;
    }

    Ok(())
}
