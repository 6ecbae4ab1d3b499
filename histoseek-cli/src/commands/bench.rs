//! Bench command - time the batch for a doubling series of worker counts.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;
use histoseek_core::{SearchConfig, SimilaritySearch};
use tracing::info;

use crate::utils::{cancel_on_ctrl_c, format_duration};

const TWO: NonZeroUsize = NonZeroUsize::MIN.saturating_add(1);

/// Timing of one round.
#[derive(Debug, Clone, Copy)]
struct Round {
    workers: NonZeroUsize,
    batch: Duration,
    total: Duration,
}

/// Worker counts for each round: `initial, 2*initial, 4*initial, ...`.
fn worker_series(initial: NonZeroUsize, rounds: u32) -> Result<Vec<NonZeroUsize>> {
    let mut series = Vec::with_capacity(rounds as usize);
    let mut workers = initial;
    for round in 0..rounds {
        if round > 0 {
            workers = workers
                .checked_mul(TWO)
                .with_context(|| format!("Worker count overflows after {} rounds", round))?;
        }
        series.push(workers);
    }
    Ok(series)
}

/// Execute the bench command.
///
/// The query histogram and the dataset listing are computed once; only the
/// batch run and ranking are repeated per round.
pub async fn execute(
    query: PathBuf,
    dataset: PathBuf,
    config: SearchConfig,
    rounds: u32,
) -> Result<()> {
    let search = SimilaritySearch::new(&config).context("Invalid search parameters")?;
    let series = worker_series(search.config().workers, rounds)?;

    let interrupt = cancel_on_ctrl_c(search.cancel_handle());

    let query_histogram = search
        .query_histogram(&query)
        .await
        .context("Search failed")?;
    let entries = search
        .list_dataset(&dataset)
        .await
        .context("Search failed")?;

    println!(
        "Benchmarking {} entries from {}",
        entries.len(),
        dataset.display()
    );

    let mut timings = Vec::with_capacity(series.len());
    for workers in series {
        println!();
        println!("Running similarity search with K={}", workers);

        let started = Instant::now();
        let outcome = search
            .run_with_workers(&query_histogram, &entries, workers)
            .await
            .context("Search failed")?;
        let total = started.elapsed();

        info!(
            workers = workers.get(),
            partitions = outcome.stats.partitions,
            elapsed_ms = total.as_millis() as u64,
            "Bench round complete"
        );

        if let Some(best) = outcome.matches.first() {
            println!("   {} {} ({:.6})", "Best match:".dimmed(), best.name, best.score);
        }
        println!("Time taken with K={}: {}", workers, format_duration(total));

        timings.push(Round {
            workers,
            batch: outcome.stats.elapsed,
            total,
        });
    }
    interrupt.abort();

    println!();
    println!("{}", "Summary".bold());
    println!("   {:>8}  {:>12}  {:>12}", "K", "batch", "total");
    for round in &timings {
        println!(
            "   {:>8}  {:>12}  {:>12}",
            round.workers,
            format_duration(round.batch),
            format_duration(round.total)
        );
    }

    Ok(())
}
