//! Storage traits and error types
//!
//! This module defines the trait interface for the resume ledger and the
//! error type shared by all on-disk sinks.

use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record in {} at line {line}: {message}", .path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of threads whose collection walk finished
///
/// Implementations are append-only. An identifier missing from the ledger
/// only means the thread was not confirmed complete, never that it does not
/// exist remotely.
pub trait ResumeLedger {
    /// Loads every identifier recorded by previous runs
    fn load(&self) -> StorageResult<HashSet<String>>;

    /// Records a thread as complete
    ///
    /// Must not return until the entry is durable. Callers only invoke this
    /// after the thread's records have themselves been made durable.
    fn mark_done(&mut self, id: &str) -> StorageResult<()>;
}
