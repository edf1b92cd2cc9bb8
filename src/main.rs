//! Thread-Harvest main entry point
//!
//! This is the command-line interface for the Thread-Harvest harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use thread_harvest::config::{load_config_with_hash, Config};
use thread_harvest::crawler::run_harvest;
use thread_harvest::HarvestError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Thread-Harvest: a resumable discussion-thread harvester
///
/// Thread-Harvest discovers threads through a paginated search endpoint,
/// collects every comment for each one, and records finished threads in a
/// ledger so an interrupted harvest resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "thread-harvest")]
#[command(version)]
#[command(about = "A resumable discussion-thread harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Delete previous outputs and the ledger before harvesting
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_text"])]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long, conflicts_with_all = ["stats", "export_text"])]
    dry_run: bool,

    /// Show statistics from the output files and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_text"])]
    stats: bool,

    /// Write comment bodies as a one-per-line text corpus and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_text: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_text {
        handle_export_text(&config)?;
    } else {
        handle_harvest(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("thread_harvest=info,warn"),
            1 => EnvFilter::new("thread_harvest=debug,info"),
            2 => EnvFilter::new("thread_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what a harvest would do
fn handle_dry_run(config: &Config) {
    println!("=== Thread-Harvest Dry Run ===\n");

    println!("Discovery:");
    println!("  Endpoint: {}", config.discovery.endpoint);
    println!("  Query: {}", config.discovery.query);
    println!("  Restrict scope: {}", config.discovery.restrict_scope);
    println!("  Target threads: {}", config.discovery.target_count);
    println!("  Max age: {} days", config.discovery.max_age_days);
    println!("  Page size: {}", config.discovery.page_size);

    println!("\nTitle Filter:");
    println!("  Primary: {}", config.filter.primary);
    for pattern in &config.filter.exclude {
        println!("  Exclude: {}", pattern);
    }

    println!("\nCollection:");
    println!("  Endpoint: {}", config.collection.endpoint);
    println!("  Page size: {}", config.collection.page_size);
    println!("  Max pages per thread: {}", config.collection.max_pages);
    println!("  Stall limit: {}", config.collection.stall_limit);

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Max attempts: {}", config.http.max_attempts);
    println!(
        "  Backoff: ceiling {}s, jitter up to {}s",
        config.http.backoff_ceiling_secs, config.http.jitter_max_secs
    );
    println!("  Page delay: {}ms", config.http.page_delay_ms);
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Threads: {}", config.output.parents_path);
    println!("  Comments: {}", config.output.records_path);
    println!("  Ledger: {}", config.output.ledger_path);
    println!("  Export: {}", config.output.export_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would collect up to {} threads, at most {} comment pages each",
        config.discovery.target_count, config.collection.max_pages
    );
}

/// Handles the --stats mode: shows statistics from the output files
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use thread_harvest::output::{load_statistics, print_statistics};
    use thread_harvest::storage::FileLedger;

    let ledger = FileLedger::new(Path::new(&config.output.ledger_path));
    let stats = load_statistics(&config.output, &ledger).context("failed to read outputs")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-text mode: writes the text corpus
fn handle_export_text(config: &Config) -> anyhow::Result<()> {
    use thread_harvest::output::{export_text, FlattenWhitespace};

    println!("=== Exporting Text Corpus ===\n");
    println!("Comments: {}", config.output.records_path);
    println!("Output: {}", config.output.export_path);
    println!();

    let lines = export_text(
        Path::new(&config.output.records_path),
        Path::new(&config.output.export_path),
        &FlattenWhitespace,
    )
    .context("export failed")?;

    println!("✓ {} lines exported to: {}", lines, config.output.export_path);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::warn!("Starting fresh harvest (previous outputs will be deleted)");
    } else {
        tracing::info!("Starting harvest (threads in the ledger will be skipped)");
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping at the next page boundary");
            signal_token.cancel();
        }
    });

    match run_harvest(config, Some(config_hash), fresh, cancel).await {
        Ok(summary) => {
            if summary.failed > 0 {
                tracing::warn!(
                    "{} threads failed and will be retried on the next run",
                    summary.failed
                );
            }
            Ok(())
        }
        Err(HarvestError::Cancelled) => {
            tracing::warn!("Harvest cancelled before discovery finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
