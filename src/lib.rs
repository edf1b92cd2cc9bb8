//! Thread-Harvest: a resumable discussion-thread harvester
//!
//! This crate walks a cursor-paginated search endpoint to discover threads,
//! then walks a second endpoint per thread to collect its comments. Results
//! are appended to JSON Lines files and completed threads are recorded in a
//! ledger so an interrupted harvest can pick up where it left off.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Thread-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Harvest cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Thread-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Harvester, RunSummary};
pub use filter::{PatternFilter, TitlePredicate};
pub use state::StopReason;
pub use storage::{ChildRecord, ParentDescriptor};
