use crate::config::types::{
    CollectionConfig, Config, DiscoveryConfig, FilterConfig, HttpConfig, OutputConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Largest page either endpoint will serve
const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound for the backoff ceiling and the jitter (one hour)
const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_discovery_config(&config.discovery)?;
    validate_filter_config(&config.filter)?;
    validate_collection_config(&config.collection)?;
    validate_http_config(&config.http)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    validate_endpoint("discovery.endpoint", &config.endpoint)?;
    validate_page_size("discovery.page_size", config.page_size)?;

    if config.query.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discovery.query cannot be empty".to_string(),
        ));
    }

    if config.target_count < 1 {
        return Err(ConfigError::Validation(format!(
            "target_count must be >= 1, got {}",
            config.target_count
        )));
    }

    if config.max_age_days < 1 {
        return Err(ConfigError::Validation(format!(
            "max_age_days must be >= 1, got {}",
            config.max_age_days
        )));
    }

    Ok(())
}

fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    validate_pattern(&config.primary)?;
    for pattern in &config.exclude {
        validate_pattern(pattern)?;
    }
    Ok(())
}

fn validate_collection_config(config: &CollectionConfig) -> Result<(), ConfigError> {
    validate_endpoint("collection.endpoint", &config.endpoint)?;
    validate_page_size("collection.page_size", config.page_size)?;

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.stall_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "stall_limit must be >= 1, got {}",
            config.stall_limit
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    for (name, value) in [
        ("backoff_ceiling_secs", config.backoff_ceiling_secs),
        ("jitter_max_secs", config.jitter_max_secs),
    ] {
        if !value.is_finite() || value < 0.0 || value > MAX_RETRY_DELAY_SECS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 0 and {}, got {}",
                name, MAX_RETRY_DELAY_SECS, value
            )));
        }
    }

    if config.page_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "page_delay_ms must be >= 100ms, got {}ms",
            config.page_delay_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("parents_path", &config.parents_path),
        ("records_path", &config.records_path),
        ("ledger_path", &config.ledger_path),
        ("export_path", &config.export_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.parents_path == config.records_path {
        return Err(ConfigError::Validation(
            "parents_path and records_path must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, endpoint, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, endpoint
        )));
    }

    Ok(())
}

fn validate_page_size(name: &str, size: u32) -> Result<(), ConfigError> {
    if size < 1 || size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_PAGE_SIZE, size
        )));
    }
    Ok(())
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Filter pattern cannot be empty".to_string(),
        ));
    }

    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Must contain a single @ with text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
