//! Append-only JSON Lines sinks
//!
//! One serialized record per line. Writers only ever append; readers stream
//! the file front to back.

use crate::storage::append::open_append;
use crate::storage::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

/// Buffered appender for a JSON Lines file
pub struct JsonlWriter {
    writer: BufWriter<File>,
}

impl JsonlWriter {
    /// Opens (or creates) `path` for appending
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = open_append(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Serializes one record onto its own line
    pub fn append<T: Serialize>(&mut self, record: &T) -> StorageResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Appends every record, returning how many were written
    pub fn append_all<'a, T, I>(&mut self, records: I) -> StorageResult<usize>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut written = 0;
        for record in records {
            self.append(record)?;
            written += 1;
        }
        Ok(written)
    }

    /// Flushes buffered lines and waits for them to reach the disk
    pub fn commit(&mut self) -> StorageResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Streams every record in a JSON Lines file through `f`
///
/// A missing file is treated as empty. Blank lines are ignored. Lines cut
/// short by a crash mid-write are skipped with a warning; any other line
/// that does not decode is reported as [`StorageError::Corrupt`].
pub fn for_each_jsonl<T, F>(path: &Path, mut f: F) -> StorageResult<()>
where
    T: DeserializeOwned,
    F: FnMut(T) -> StorageResult<()>,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => f(record)?,
            Err(e) if e.is_eof() => {
                tracing::warn!(
                    "Skipping truncated line {} in {}",
                    index + 1,
                    path.display()
                );
            }
            Err(e) => {
                return Err(StorageError::Corrupt {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: e.to_string(),
                })
            }
        }
    }

    Ok(())
}

/// Reads a whole JSON Lines file into memory
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> StorageResult<Vec<T>> {
    let mut records = Vec::new();
    for_each_jsonl(path, |record| {
        records.push(record);
        Ok(())
    })?;
    Ok(records)
}
