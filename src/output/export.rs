//! Plain-text corpus export
//!
//! Downstream training reads a text file with one example per line. This
//! module turns the records file into that shape. Anything beyond making a
//! body fit on one line belongs to the downstream tools.

use crate::storage::{for_each_jsonl, ChildRecord};
use crate::HarvestError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Bodies the source uses in place of removed content
const PLACEHOLDER_BODIES: [&str; 2] = ["[deleted]", "[removed]"];

/// Turns a comment body into a single export line
pub trait TextNormalizer {
    /// Returns `None` to leave the body out of the export
    fn normalize(&self, body: &str) -> Option<String>;
}

/// Collapses every whitespace run to one space and drops empty or
/// placeholder bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenWhitespace;

impl TextNormalizer for FlattenWhitespace {
    fn normalize(&self, body: &str) -> Option<String> {
        let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.is_empty() || PLACEHOLDER_BODIES.contains(&flat.as_str()) {
            None
        } else {
            Some(flat)
        }
    }
}

/// Writes one normalized comment body per line to `out_path`
///
/// The output file is replaced. Returns the number of lines written.
pub fn export_text(
    records_path: &Path,
    out_path: &Path,
    normalizer: &dyn TextNormalizer,
) -> Result<usize, HarvestError> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(out_path)?);
    let mut lines = 0;

    for_each_jsonl(records_path, |record: ChildRecord| {
        if let Some(line) = normalizer.normalize(&record.body) {
            writeln!(writer, "{}", line)?;
            lines += 1;
        }
        Ok(())
    })?;

    writer.flush()?;
    tracing::info!("Exported {} lines to {}", lines, out_path.display());
    Ok(lines)
}
