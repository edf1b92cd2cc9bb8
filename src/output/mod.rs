//! Output module for reporting on and exporting harvest results
//!
//! This module handles:
//! - Recording harvest statistics from the output files
//! - Exporting comment bodies as a plain-text training corpus

mod export;
pub mod stats;

pub use export::{export_text, FlattenWhitespace, TextNormalizer};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
