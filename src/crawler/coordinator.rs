//! Harvest coordinator - main orchestration logic
//!
//! This module drives a complete harvest:
//! - Discovering threads once
//! - Appending newly seen thread descriptors
//! - Skipping threads already recorded in the resume ledger
//! - Collecting each remaining thread and persisting its comments
//! - Marking threads done only after their comments are durable

use crate::config::{Config, OutputConfig};
use crate::crawler::{collect, discover, ApiClient, WalkContext};
use crate::filter::PatternFilter;
use crate::storage::{
    read_jsonl, ConfigStamp, FileLedger, JsonlWriter, ParentDescriptor, ResumeLedger, StampStatus,
};
use crate::{HarvestError, StopReason};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Counters for one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Threads returned by discovery
    pub discovered: usize,

    /// Threads skipped because the ledger already had them
    pub skipped_done: usize,

    /// Threads collected and marked done this run
    pub completed: usize,

    /// Threads abandoned after a fetch failure (retried next run)
    pub failed: usize,

    /// Completed threads whose walk ended on a cursor stall
    pub stalled: usize,

    /// Comments appended to the records file
    pub records_written: usize,

    /// True if a stop signal ended the run early
    pub cancelled: bool,
}

/// Main harvest coordinator
pub struct Harvester {
    config: Config,
    client: ApiClient,
    filter: PatternFilter,
    ledger: FileLedger,
    config_hash: Option<String>,
    cancel: CancellationToken,
}

impl Harvester {
    /// Creates a new harvester
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Client and filter built from the config
    /// * `Err(HarvestError)` - A filter pattern or the HTTP client was invalid
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let client = ApiClient::new(&config.http, &config.user_agent)?;
        let filter = PatternFilter::from_config(&config.filter)?;
        let ledger = FileLedger::new(Path::new(&config.output.ledger_path));

        Ok(Self {
            config,
            client,
            filter,
            ledger,
            config_hash: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Records the config hash so config changes between runs are reported
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Uses an externally owned stop signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the harvest at the next page or thread boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the harvest
    ///
    /// Discovery failure is fatal. After that, a thread that fails to fetch
    /// is logged and skipped without being marked done, and the run goes on.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let start_time = Instant::now();
        self.check_config_stamp()?;

        let ctx = WalkContext {
            client: &self.client,
            page_delay: self.config.http.page_delay(),
            cancel: &self.cancel,
        };

        let discovery = discover(&ctx, &self.config.discovery, &self.filter).await?;
        if discovery.stop == StopReason::Cancelled {
            tracing::info!("Harvest cancelled during discovery; nothing written");
            return Err(HarvestError::Cancelled);
        }

        let parents_path = Path::new(&self.config.output.parents_path);
        let appended = append_new_parents(parents_path, &discovery.parents)?;
        tracing::info!(
            "{} threads discovered, {} new descriptors written to {}",
            discovery.parents.len(),
            appended,
            parents_path.display()
        );

        let done = self.ledger.load()?;
        let mut records = JsonlWriter::open(Path::new(&self.config.output.records_path))?;
        let mut summary = RunSummary {
            discovered: discovery.parents.len(),
            ..RunSummary::default()
        };

        let total = discovery.parents.len();
        let mut walked_any = false;

        for (index, parent) in discovery.parents.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            if done.contains(&parent.id) {
                tracing::debug!("Thread {} already harvested, skipping", parent.id);
                summary.skipped_done += 1;
                continue;
            }

            if walked_any {
                ctx.pause().await;
            }
            walked_any = true;

            tracing::info!(
                "[{}/{}] Collecting thread {} ({})",
                index + 1,
                total,
                parent.id,
                parent.title
            );

            let outcome = match collect(&ctx, &self.config.collection, &parent.id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Skipping thread {}: {}", parent.id, e);
                    summary.failed += 1;
                    continue;
                }
            };

            if outcome.stop.is_interrupted() {
                tracing::info!(
                    "Stopped during thread {}; it will be collected on the next run",
                    parent.id
                );
                summary.cancelled = true;
                break;
            }

            let written = records.append_all(&outcome.records)?;
            records.commit()?;
            self.ledger.mark_done(&parent.id)?;

            summary.completed += 1;
            summary.records_written += written;
            if outcome.stop == StopReason::Stalled {
                summary.stalled += 1;
            }

            if outcome.stop.is_partial() {
                tracing::warn!(
                    "Thread {} ended early ({}): keeping {} comments over {} pages",
                    parent.id,
                    outcome.stop,
                    written,
                    outcome.pages_fetched
                );
            } else {
                tracing::info!(
                    "Thread {} done: {} comments over {} pages ({})",
                    parent.id,
                    written,
                    outcome.pages_fetched,
                    outcome.stop
                );
            }
        }

        tracing::info!(
            "Harvest {} in {:?}: {} completed, {} already done, {} failed, {} stalled, {} comments written",
            if summary.cancelled { "interrupted" } else { "finished" },
            start_time.elapsed(),
            summary.completed,
            summary.skipped_done,
            summary.failed,
            summary.stalled,
            summary.records_written
        );

        Ok(summary)
    }

    fn check_config_stamp(&self) -> Result<(), HarvestError> {
        let Some(hash) = &self.config_hash else {
            return Ok(());
        };

        let stamp = ConfigStamp::for_ledger(self.ledger.path());
        match stamp.check_and_update(hash)? {
            StampStatus::New | StampStatus::Unchanged => {}
            StampStatus::Changed { previous } => {
                tracing::warn!(
                    "Configuration changed since the last run (was {}); threads already in {} will not be re-collected",
                    previous,
                    self.ledger.path().display()
                );
            }
        }
        Ok(())
    }
}

/// Appends descriptors whose id is not yet in the parents file
///
/// Keeps the file append-only while avoiding a second copy of every thread
/// on each resumed run. Returns how many were appended.
fn append_new_parents(path: &Path, parents: &[ParentDescriptor]) -> Result<usize, HarvestError> {
    let existing: HashSet<String> = read_jsonl::<ParentDescriptor>(path)?
        .into_iter()
        .map(|parent| parent.id)
        .collect();

    let fresh: Vec<&ParentDescriptor> = parents
        .iter()
        .filter(|parent| !existing.contains(&parent.id))
        .collect();
    if fresh.is_empty() {
        return Ok(0);
    }

    let mut writer = JsonlWriter::open(path)?;
    let written = writer.append_all(fresh)?;
    writer.commit()?;
    Ok(written)
}

/// Deletes every output file so the next run starts from scratch
pub fn reset_outputs(output: &OutputConfig) -> Result<(), HarvestError> {
    let ledger_path = Path::new(&output.ledger_path);
    let stamp = ConfigStamp::for_ledger(ledger_path);

    for path in [
        Path::new(&output.parents_path),
        Path::new(&output.records_path),
        ledger_path,
        stamp.path(),
    ] {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Runs a complete harvest
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the config file, stored next to the ledger
/// * `fresh` - Delete previous outputs first instead of resuming
/// * `cancel` - Stop signal honoured between pages and threads
///
/// # Example
///
/// ```no_run
/// use thread_harvest::config::load_config_with_hash;
/// use thread_harvest::crawler::run_harvest;
/// use tokio_util::sync::CancellationToken;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = run_harvest(config, Some(hash), false, CancellationToken::new()).await?;
/// println!("{} threads completed", summary.completed);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: Option<String>,
    fresh: bool,
    cancel: CancellationToken,
) -> Result<RunSummary, HarvestError> {
    if fresh {
        reset_outputs(&config.output)?;
    }

    let mut harvester = Harvester::new(config)?.with_cancellation(cancel);
    if let Some(hash) = config_hash {
        harvester = harvester.with_config_hash(hash);
    }
    harvester.run().await
}
