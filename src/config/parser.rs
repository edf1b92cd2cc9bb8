use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is stored next to the resume ledger so a resumed harvest can tell
/// when the discovery scope may have changed between runs.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[discovery]
endpoint = "https://www.reddit.com/r/Habs/search.json"
query = "Game Thread"
target-count = 300
max-age-days = 730

[filter]
primary = "(?i)\\bgame thread\\b"
exclude = ["(?i)\\bpost[- ]?game\\b", "(?i)\\bpre[- ]?game\\b"]

[collection]
endpoint = "https://api.pullpush.io/reddit/search/comment/"
max-pages = 200
stall-limit = 3

[http]
timeout-secs = 30
max-attempts = 5
backoff-ceiling-secs = 30.0
jitter-max-secs = 1.0
page-delay-ms = 1000

[user-agent]
crawler-name = "ThreadHarvest"
crawler-version = "0.1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
parents-path = "data/threads.jsonl"
records-path = "data/comments.jsonl"
ledger-path = "data/done_threads.txt"
export-path = "data/train.txt"
"#;
