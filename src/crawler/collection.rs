//! Per-thread comment collection
//!
//! Pages are requested newest first with a numeric `before` watermark. After
//! each accepted page the watermark becomes `oldest - 1`, so it strictly
//! decreases even when the endpoint treats `before` as inclusive. A page
//! whose oldest timestamp is missing, or is not older than the previous
//! page's, counts as a stall; `stall_limit` consecutive stalls end the walk.
//! Stalled pages are dropped and leave the watermark where it was.

use crate::config::CollectionConfig;
use crate::crawler::{FetchError, WalkContext};
use crate::state::StopReason;
use crate::storage::ChildRecord;
use serde::Deserialize;

/// Result of walking one thread
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    /// Comments in the order received, each tagged with the thread id
    pub records: Vec<ChildRecord>,

    /// Comment pages requested, including stalled ones
    pub pages_fetched: u32,

    pub stop: StopReason,
}

/// The endpoint either wraps its results or returns a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommentPage {
    Wrapped { data: Vec<ChildRecord> },
    Bare(Vec<ChildRecord>),
}

impl CommentPage {
    fn into_items(self) -> Vec<ChildRecord> {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(items) => items,
        }
    }
}

/// Collects comments for `thread_id`
///
/// Never fails on pagination trouble: stalls and the page ceiling end the
/// walk with whatever was gathered. Only a terminal fetch failure is
/// returned as an error.
pub async fn collect(
    ctx: &WalkContext<'_>,
    config: &CollectionConfig,
    thread_id: &str,
) -> Result<CollectionOutcome, FetchError> {
    let mut records = Vec::new();
    let mut before: Option<i64> = None;
    let mut previous_oldest: Option<i64> = None;
    let mut stalls = 0;
    let mut pages_fetched = 0;
    let mut stop = StopReason::PageLimit;

    for page_number in 1..=config.max_pages {
        if page_number > 1 {
            ctx.pause().await;
        }
        if ctx.cancel.is_cancelled() {
            stop = StopReason::Cancelled;
            break;
        }

        let mut params = vec![
            ("link_id", thread_id.to_string()),
            ("size", config.page_size.to_string()),
            ("sort", "desc".to_string()),
            ("sort_type", "created_utc".to_string()),
        ];
        if let Some(before) = before {
            params.push(("before", before.to_string()));
        }

        let page: CommentPage = ctx.client.fetch_json(&config.endpoint, &params).await?;
        pages_fetched += 1;

        let mut items = page.into_items();
        if items.is_empty() {
            stop = StopReason::Exhausted;
            break;
        }

        let oldest = items.last().and_then(|item| item.created_utc);
        let advanced = match oldest {
            Some(ts) => previous_oldest.map_or(true, |prev| ts < prev),
            None => false,
        };

        if !advanced {
            stalls += 1;
            tracing::debug!(
                "Thread {}: page {} did not advance the cursor ({}/{})",
                thread_id,
                page_number,
                stalls,
                config.stall_limit
            );
            if stalls >= config.stall_limit {
                tracing::warn!(
                    "Thread {}: cursor stalled at page {}, keeping {} comments",
                    thread_id,
                    page_number,
                    records.len()
                );
                stop = StopReason::Stalled;
                break;
            }
            continue;
        }
        stalls = 0;

        for item in &mut items {
            item.thread_id = thread_id.to_string();
        }
        records.extend(items);

        previous_oldest = oldest;
        before = oldest.map(|ts| ts - 1);
    }

    if stop == StopReason::PageLimit {
        tracing::info!(
            "Thread {}: reached the {} page limit with {} comments",
            thread_id,
            config.max_pages,
            records.len()
        );
    }

    Ok(CollectionOutcome {
        records,
        pages_fetched,
        stop,
    })
}
