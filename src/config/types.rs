use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Thread-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub filter: FilterConfig,
    pub collection: CollectionConfig,
    pub http: HttpConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Thread discovery configuration (search endpoint)
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Search endpoint URL
    pub endpoint: String,

    /// Search text sent as `q`
    pub query: String,

    /// Restrict the search to the endpoint's community (`restrict_sr`)
    #[serde(rename = "restrict-scope", default = "default_restrict_scope")]
    pub restrict_scope: bool,

    /// Number of distinct threads to collect
    #[serde(rename = "target-count")]
    pub target_count: usize,

    /// Threads older than this are never considered
    #[serde(rename = "max-age-days")]
    pub max_age_days: u32,

    /// Results requested per search page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,
}

/// Title predicate patterns
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// A title must match this pattern to qualify
    pub primary: String,

    /// A title matching any of these never qualifies
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Comment collection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Comment search endpoint URL
    pub endpoint: String,

    /// Comments requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Hard ceiling on pages fetched per thread
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Consecutive non-advancing pages tolerated before giving up on a thread
    #[serde(rename = "stall-limit")]
    pub stall_limit: u32,
}

/// HTTP behaviour shared by both endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Requests made for one page before giving up
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Upper bound on the exponential part of the retry delay (seconds)
    #[serde(rename = "backoff-ceiling-secs")]
    pub backoff_ceiling_secs: f64,

    /// Upper bound on the random part of the retry delay (seconds)
    #[serde(rename = "jitter-max-secs")]
    pub jitter_max_secs: f64,

    /// Pause between consecutive page requests (milliseconds)
    #[serde(rename = "page-delay-ms")]
    pub page_delay_ms: u64,
}

impl HttpConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for harvester-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// JSON Lines file of discovered threads
    #[serde(rename = "parents-path")]
    pub parents_path: String,

    /// JSON Lines file of collected comments
    #[serde(rename = "records-path")]
    pub records_path: String,

    /// Completed-thread ledger
    #[serde(rename = "ledger-path")]
    pub ledger_path: String,

    /// Plain text corpus written by `--export-text`
    #[serde(rename = "export-path")]
    pub export_path: String,
}

fn default_restrict_scope() -> bool {
    true
}

fn default_page_size() -> u32 {
    100
}
