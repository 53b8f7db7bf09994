//! Output sink traits and error types
//!
//! This module defines the trait interface for dataset row sinks and the
//! associated error type.

use crate::dataset::DatasetRow;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for dataset rows
///
/// Rows arrive in the order the builder produces them; each is written once.
pub trait RowSink {
    /// Writes one row
    fn write_row(&mut self, row: &DatasetRow) -> OutputResult<()>;

    /// Flushes everything written so far
    ///
    /// Called once after the last row.
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

/// Collects rows in memory
impl RowSink for Vec<DatasetRow> {
    fn write_row(&mut self, row: &DatasetRow) -> OutputResult<()> {
        self.push(row.clone());
        Ok(())
    }
}
