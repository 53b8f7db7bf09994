//! Output module for the dataset and cache reports
//!
//! This module handles:
//! - Writing dataset rows as CSV
//! - Reporting statistics about the metadata cache

mod csv;
pub mod stats;
mod traits;

pub use csv::{escape_field, format_row, header_fields, CsvRowWriter};
pub use stats::{format_statistics, load_statistics, print_statistics, StoreStatistics};
pub use traits::{OutputError, OutputResult, RowSink};

use std::fs::OpenOptions;
use std::path::Path;

/// Checks that `path` can be written before a long build starts
///
/// Creates the file (empty) if needed; an existing file is left untouched
/// until the writer truncates it.
pub fn ensure_writable(path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(OutputError::Write(format!(
                "directory {} does not exist",
                parent.display()
            )));
        }
    }

    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}
