//! File-backed resume ledger and config stamp

use crate::storage::append::open_append;
use crate::storage::{ResumeLedger, StorageResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Resume ledger stored as one thread identifier per line
///
/// The file is read in full at startup and only ever appended to.
pub struct FileLedger {
    path: PathBuf,
    file: Option<File>,
}

impl FileLedger {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResumeLedger for FileLedger {
    fn load(&self) -> StorageResult<HashSet<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn mark_done(&mut self, id: &str) -> StorageResult<()> {
        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }

        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}", id)?;
            file.sync_data()?;
        }
        Ok(())
    }
}

/// Result of comparing the current config hash with the stored one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StampStatus {
    /// No previous stamp existed
    New,
    /// The stored hash matches
    Unchanged,
    /// The config changed since the stamp was written
    Changed { previous: String },
}

/// Config hash stored next to the ledger
///
/// Ledger entries were produced under some discovery scope. When the config
/// changes between runs the ledger is still honoured, but the operator is
/// told about it.
pub struct ConfigStamp {
    path: PathBuf,
}

impl ConfigStamp {
    /// Stamp file for the ledger at `ledger_path` (`<ledger>.config-hash`)
    pub fn for_ledger(ledger_path: &Path) -> Self {
        let mut name = ledger_path.as_os_str().to_owned();
        name.push(".config-hash");
        Self {
            path: PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compares `hash` with the stored stamp, then stores `hash`
    pub fn check_and_update(&self, hash: &str) -> StorageResult<StampStatus> {
        let status = match std::fs::read_to_string(&self.path) {
            Ok(previous) if previous.trim() == hash => StampStatus::Unchanged,
            Ok(previous) => StampStatus::Changed {
                previous: previous.trim().to_string(),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => StampStatus::New,
            Err(e) => return Err(e.into()),
        };

        if status != StampStatus::Unchanged {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&self.path, format!("{}\n", hash))?;
        }

        Ok(status)
    }
}
