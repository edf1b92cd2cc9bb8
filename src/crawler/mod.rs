//! Harvest pipeline
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry logic
//! - Thread discovery over the search endpoint
//! - Per-thread comment collection with stall detection
//! - Overall harvest coordination and resumption

mod collection;
mod coordinator;
mod discovery;
mod fetcher;

pub use collection::{collect, CollectionOutcome};
pub use coordinator::{reset_outputs, run_harvest, Harvester, RunSummary};
pub use discovery::{age_cutoff, discover, DiscoveryOutcome};
pub use fetcher::{
    build_http_client, is_transient_status, ApiClient, Attempt, FetchError, RetryPolicy,
};

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a walker needs besides its own parameters
#[derive(Clone, Copy)]
pub struct WalkContext<'a> {
    /// Client used for every page request
    pub client: &'a ApiClient,

    /// Politeness pause between consecutive requests
    pub page_delay: Duration,

    /// Checked before every page request
    pub cancel: &'a CancellationToken,
}

impl WalkContext<'_> {
    /// Waits out the politeness delay, returning early if cancelled
    pub async fn pause(&self) {
        if self.page_delay.is_zero() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.page_delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}
