//! Statistics generation from harvest output files
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the sinks and the resume ledger.

use crate::config::OutputConfig;
use crate::storage::{for_each_jsonl, read_jsonl, ChildRecord, ParentDescriptor, ResumeLedger};
use crate::HarvestError;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;

/// Harvest statistics summary
#[derive(Debug, Clone, Default)]
pub struct HarvestStatistics {
    /// Thread descriptors in the parents file
    pub threads_discovered: usize,

    /// Entries in the resume ledger
    pub threads_done: usize,

    /// Discovered threads not yet in the ledger
    pub threads_pending: usize,

    /// Comments in the records file
    pub total_comments: usize,

    /// Comments whose body is empty
    pub empty_bodies: usize,

    /// Comment count per thread id
    pub comments_per_thread: HashMap<String, usize>,

    /// Oldest and newest comment timestamps seen
    pub time_span: Option<(i64, i64)>,
}

impl HarvestStatistics {
    /// Threads with the most comments, largest first
    pub fn top_threads(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .comments_per_thread
            .iter()
            .map(|(id, count)| (id.as_str(), *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        counts.truncate(limit);
        counts
    }
}

/// Loads statistics from the output files
///
/// # Arguments
///
/// * `output` - Paths of the sinks
/// * `ledger` - The resume ledger to count completed threads from
pub fn load_statistics(
    output: &OutputConfig,
    ledger: &dyn ResumeLedger,
) -> Result<HarvestStatistics, HarvestError> {
    let parents: Vec<ParentDescriptor> = read_jsonl(Path::new(&output.parents_path))?;
    let done = ledger.load()?;

    let mut stats = HarvestStatistics {
        threads_discovered: parents.len(),
        threads_done: done.len(),
        threads_pending: parents.iter().filter(|p| !done.contains(&p.id)).count(),
        ..HarvestStatistics::default()
    };

    for_each_jsonl(Path::new(&output.records_path), |record: ChildRecord| {
        stats.total_comments += 1;
        if record.body.trim().is_empty() {
            stats.empty_bodies += 1;
        }
        *stats
            .comments_per_thread
            .entry(record.thread_id)
            .or_insert(0) += 1;
        if let Some(ts) = record.created_utc {
            stats.time_span = Some(match stats.time_span {
                Some((oldest, newest)) => (oldest.min(ts), newest.max(ts)),
                None => (ts, ts),
            });
        }
        Ok(())
    })?;

    Ok(stats)
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Threads:");
    println!("  Discovered: {}", stats.threads_discovered);
    println!("  Completed (ledger): {}", stats.threads_done);
    println!("  Pending: {}", stats.threads_pending);
    println!();

    println!("Comments:");
    println!("  Total: {}", stats.total_comments);
    println!("  Empty bodies: {}", stats.empty_bodies);
    if let Some((oldest, newest)) = stats.time_span {
        println!(
            "  Span: {} to {}",
            format_timestamp(oldest),
            format_timestamp(newest)
        );
    }
    if !stats.comments_per_thread.is_empty() {
        let average = stats.total_comments as f64 / stats.comments_per_thread.len() as f64;
        println!("  Average per thread: {:.1}", average);
    }
    println!();

    let top = stats.top_threads(10);
    if !top.is_empty() {
        println!("Largest Threads:");
        for (id, count) in top {
            println!("  - {}: {}", id, count);
        }
        println!();
    }

    let completion = if stats.threads_discovered > 0 {
        (stats.threads_discovered - stats.threads_pending) as f64
            / stats.threads_discovered as f64
            * 100.0
    } else {
        0.0
    };
    println!(
        "Completion: {:.1}% ({} / {} threads harvested)",
        completion,
        stats.threads_discovered - stats.threads_pending,
        stats.threads_discovered
    );
}
