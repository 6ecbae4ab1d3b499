//! Histoseek CLI - color-histogram image similarity search.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use histoseek_core::config::default_workers;
use histoseek_core::{SearchConfig, DEFAULT_DEPTH, DEFAULT_TOP_N};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0    Success
  1    General error
  64   Invalid parameters (workers, top-n, depth, extensions)
  66   Query image or dataset directory cannot be read
  70   A worker task crashed
  74   Failed to write output
  130  Cancelled (Ctrl-C)";

#[derive(Parser)]
#[command(name = "histoseek")]
#[command(author, version, about = "Color-histogram image similarity search", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that runs a search.
#[derive(Args, Debug, Clone)]
struct TuningArgs {
    /// Number of similar images to report
    #[arg(short = 'n', long = "top", default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Bits kept per color channel (histogram has 2^(3*depth) buckets)
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    depth: u8,

    /// Accepted image extensions, comma-separated
    #[arg(long = "ext", value_delimiter = ',', default_value = "jpg,jpeg,png")]
    extensions: Vec<String>,
}

impl TuningArgs {
    fn to_config(&self, workers: usize) -> SearchConfig {
        SearchConfig::default()
            .with_workers(workers)
            .with_top_n(self.top_n)
            .with_depth(self.depth)
            .with_extensions(self.extensions.iter().cloned())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find the images in a directory most similar to a query image
    Search {
        /// Query image
        #[arg(value_name = "QUERY")]
        query: PathBuf,

        /// Directory of images to search
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Number of parallel workers (dataset partitions)
        #[arg(short = 'k', long, default_value_t = default_workers())]
        workers: usize,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Only print the ranked list
        #[arg(short, long)]
        quiet: bool,
    },

    /// Time the search for K, 2K, 4K, ... workers
    Bench {
        /// Query image
        #[arg(value_name = "QUERY")]
        query: PathBuf,

        /// Directory of images to search
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Worker count of the first round; doubled every round
        #[arg(value_name = "INITIAL_K")]
        initial_k: usize,

        /// Number of rounds
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        rounds: u32,

        #[command(flatten)]
        tuning: TuningArgs,
    },
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Search {
            query,
            dataset,
            workers,
            tuning,
            json,
            quiet,
        } => {
            let options = commands::search::SearchOptions { json, quiet };
            commands::search::execute(query, dataset, tuning.to_config(workers), options).await
        }
        Commands::Bench {
            query,
            dataset,
            initial_k,
            rounds,
            tuning,
        } => commands::bench::execute(query, dataset, tuning.to_config(initial_k), rounds).await,
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    utils::init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    std::process::ExitCode::from(exit.code)
}
