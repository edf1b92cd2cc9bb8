//! Thread discovery over the cursor-paginated search endpoint
//!
//! Results are assumed to arrive newest first. The walk stops for good at
//! the first item older than the age cutoff, so an endpoint that returns
//! out-of-order pages will lose qualifying items past that point.

use crate::config::DiscoveryConfig;
use crate::crawler::{FetchError, WalkContext};
use crate::filter::TitlePredicate;
use crate::state::StopReason;
use crate::storage::ParentDescriptor;
use serde::Deserialize;
use std::collections::HashSet;

const SECONDS_PER_DAY: i64 = 86_400;

/// Result of a discovery walk
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// Qualifying threads, de-duplicated, in the order first seen
    pub parents: Vec<ParentDescriptor>,

    /// Search pages requested
    pub pages_fetched: u32,

    pub stop: StopReason,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Listing,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    children: Vec<ListingChild>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: ParentDescriptor,
}

/// Oldest `created_utc` still eligible at time `now`
pub fn age_cutoff(now: i64, max_age_days: u32) -> i64 {
    now - i64::from(max_age_days) * SECONDS_PER_DAY
}

/// Walks the search endpoint collecting threads whose title qualifies
///
/// Stops when `target_count` distinct threads are collected, when an item
/// older than the cutoff appears, or when the endpoint runs out of results.
/// A fetch failure aborts the whole walk: there is no partial discovery.
pub async fn discover(
    ctx: &WalkContext<'_>,
    config: &DiscoveryConfig,
    predicate: &dyn TitlePredicate,
) -> Result<DiscoveryOutcome, FetchError> {
    let cutoff = age_cutoff(chrono::Utc::now().timestamp(), config.max_age_days);
    let target = config.target_count;

    let mut parents = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages_fetched = 0;

    tracing::info!(
        "Discovering up to {} threads matching '{}' (cutoff {})",
        target,
        config.query,
        cutoff
    );

    let stop = loop {
        if ctx.cancel.is_cancelled() {
            break StopReason::Cancelled;
        }

        let restrict = if config.restrict_scope { "1" } else { "0" };
        let mut params = vec![
            ("q", config.query.clone()),
            ("restrict_sr", restrict.to_string()),
            ("sort", "new".to_string()),
            ("t", "all".to_string()),
            ("limit", config.page_size.to_string()),
        ];
        if let Some(after) = &cursor {
            params.push(("after", after.clone()));
        }

        let page: SearchResponse = ctx.client.fetch_json(&config.endpoint, &params).await?;
        pages_fetched += 1;

        let Listing { children, after } = page.data;
        if children.is_empty() {
            break StopReason::Exhausted;
        }

        let items = children.into_iter().map(|child| child.data);
        if let Some(stop) = absorb_page(items, cutoff, target, predicate, &mut parents, &mut seen)
        {
            break stop;
        }

        tracing::debug!(
            "Discovery page {}: {} threads so far",
            pages_fetched,
            parents.len()
        );

        cursor = after.filter(|a| !a.is_empty());
        if cursor.is_none() {
            break StopReason::Exhausted;
        }

        ctx.pause().await;
    };

    parents.truncate(target);

    tracing::info!(
        "Discovery finished: {} threads from {} pages ({})",
        parents.len(),
        pages_fetched,
        stop
    );

    Ok(DiscoveryOutcome {
        parents,
        pages_fetched,
        stop,
    })
}

/// Applies one page of results to the running collection
///
/// Returns the reason to stop, or `None` to fetch the next page.
fn absorb_page<I>(
    items: I,
    cutoff: i64,
    target: usize,
    predicate: &dyn TitlePredicate,
    parents: &mut Vec<ParentDescriptor>,
    seen: &mut HashSet<String>,
) -> Option<StopReason>
where
    I: IntoIterator<Item = ParentDescriptor>,
{
    for item in items {
        if item.created_utc < cutoff {
            return Some(StopReason::CutoffReached);
        }

        if !predicate.accepts(&item.title) || seen.contains(&item.id) {
            continue;
        }

        seen.insert(item.id.clone());
        parents.push(item);
        if parents.len() >= target {
            return Some(StopReason::TargetReached);
        }
    }
    None
}
