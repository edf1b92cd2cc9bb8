//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings
//! - Classifying each response as success, transient or terminal
//! - Retrying transient failures with capped exponential backoff and jitter
//! - Decoding JSON bodies

use crate::config::{HttpConfig, UserAgentConfig};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Terminal outcome of a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Gave up on {url} after {attempts} attempts: {last_cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_cause: String,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {source}")]
    Parse {
        url: String,
        source: serde_json::Error,
    },

    #[error("Request to {url} could not be built: {source}")]
    Request { url: String, source: reqwest::Error },
}

/// Result of a single request
#[derive(Debug)]
pub enum Attempt<T> {
    /// 2xx with a decodable body
    Done(T),

    /// Worth retrying: network failure or a throttling/5xx status
    Transient(String),

    /// Retrying would not help
    Terminal(FetchError),
}

/// Statuses retried the same way as network errors
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Retry bounds for one logical request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total requests allowed, including the first
    pub max_attempts: u32,

    /// Cap on the exponential part of the delay (seconds)
    pub backoff_ceiling: f64,

    /// Cap on the random part of the delay (seconds)
    pub jitter_max: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_ceiling: config.backoff_ceiling_secs,
            jitter_max: config.jitter_max_secs,
        }
    }

    /// `min(ceiling, 2^(attempt-1))` seconds, before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let secs = 2f64.powi(exponent).min(self.backoff_ceiling).max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_max > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.jitter_max)
        } else {
            0.0
        };
        let jitter = Duration::try_from_secs_f64(jitter).unwrap_or(Duration::MAX);
        self.base_delay(attempt).saturating_add(jitter)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use thread_harvest::config::{HttpConfig, UserAgentConfig};
/// use thread_harvest::crawler::build_http_client;
///
/// let http = HttpConfig {
///     timeout_secs: 30,
///     max_attempts: 5,
///     backoff_ceiling_secs: 30.0,
///     jitter_max_secs: 1.0,
///     page_delay_ms: 1000,
/// };
/// let agent = UserAgentConfig {
///     crawler_name: "ThreadHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&http, &agent).unwrap();
/// ```
pub fn build_http_client(
    http: &HttpConfig,
    agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(http.timeout_secs);

    Client::builder()
        .user_agent(agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// JSON API client that retries transient failures
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(http: &HttpConfig, agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(
            build_http_client(http, agent)?,
            RetryPolicy::from_config(http),
        ))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// GETs `url` with `params` and decodes the JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Decode body; malformed JSON is terminal |
    /// | HTTP 429, 500, 502, 503, 504 | Retry |
    /// | Timeout, connection or body read failure | Retry |
    /// | Any other status | Terminal |
    /// | Request build failure | Terminal |
    ///
    /// At most `max_attempts` requests are sent. Running out of attempts
    /// yields [`FetchError::Exhausted`] carrying the last transient cause.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let max_attempts = self.policy.max_attempts;
        let mut last_cause = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt(url, params).await {
                Attempt::Done(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", url, attempt);
                    }
                    return Ok(value);
                }
                Attempt::Terminal(e) => return Err(e),
                Attempt::Transient(cause) => {
                    if attempt < max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        tracing::warn!(
                            "Transient failure for {} (attempt {}/{}): {}; retrying in {:.2}s",
                            url,
                            attempt,
                            max_attempts,
                            cause,
                            delay.as_secs_f64()
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                    last_cause = cause;
                }
            }
        }

        tracing::error!(
            "Giving up on {} after {} attempts: {}",
            url,
            max_attempts,
            last_cause
        );
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_cause,
        })
    }

    /// Sends one request and classifies the outcome
    async fn attempt<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Attempt<T> {
        let response = match self.client.get(url).query(params).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Terminal(FetchError::Request {
                    url: url.to_string(),
                    source: e,
                })
            }
            Err(e) => return Attempt::Transient(describe_network_error(&e)),
        };

        let status = response.status();
        if is_transient_status(status) {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }
        if !status.is_success() {
            return Attempt::Terminal(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Attempt::Transient(format!("body read failed: {}", e)),
        };

        match serde_json::from_slice(&body) {
            Ok(value) => Attempt::Done(value),
            Err(e) => Attempt::Terminal(FetchError::Parse {
                url: url.to_string(),
                source: e,
            }),
        }
    }
}

fn describe_network_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
