//! Storage module for persisting harvest results
//!
//! This module handles everything written to disk during a harvest:
//! - Record types for threads and comments
//! - Append-only JSON Lines sinks
//! - The resume ledger of completed threads
//! - The config stamp used to detect scope changes between runs

mod append;
mod jsonl;
mod ledger;
mod traits;

pub use jsonl::{for_each_jsonl, read_jsonl, JsonlWriter};
pub use ledger::{ConfigStamp, FileLedger, StampStatus};
pub use traits::{ResumeLedger, StorageError, StorageResult};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A discovered discussion thread
///
/// Fields other than `id`, `title` and `created_utc` are carried through
/// from the search endpoint untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentDescriptor {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_utc: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A comment collected for one thread
///
/// `thread_id` is filled in by the collection walker; the endpoint's own
/// fields are carried through in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default, deserialize_with = "optional_epoch_seconds")]
    pub created_utc: Option<i64>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub body: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reads an epoch timestamp that may arrive as an integer, a float or a
/// numeric string. Fractional seconds are truncated.
fn epoch_from_value(value: &Value) -> Option<i64> {
    let from_float = |f: f64| f.is_finite().then(|| f.trunc() as i64);
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(from_float)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(from_float),
        _ => None,
    }
}

fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    epoch_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("invalid epoch timestamp: {}", value)))
}

fn optional_epoch_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(epoch_from_value(&value))
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
