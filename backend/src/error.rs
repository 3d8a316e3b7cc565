//! Error types for the Tabmerge merge-and-lookup pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ReadError`] - a single input file could not be admitted or decoded
//! - [`FileError`] - why a file was left out of the merged table
//! - [`LookupError`] - lookup request or per-column failures
//! - [`ExportError`] - encoding the final table
//! - [`SessionError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer
//!
//! Per-file and per-column errors are recoverable: they are collected as
//! diagnostics while the pipeline continues with the remaining items.

use thiserror::Error;

// =============================================================================
// Read Errors
// =============================================================================

/// Errors while admitting or decoding one input file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// File exceeds the admission size limit. Nothing was read.
    #[error("File '{name}' exceeds the {limit} byte limit ({size} bytes)")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// Malformed or unsupported content.
    #[error("Error reading {name}: {message}")]
    FileUnreadable { name: String, message: String },
}

impl ReadError {
    pub fn unreadable(name: impl Into<String>, message: impl ToString) -> Self {
        Self::FileUnreadable {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Name of the offending file.
    pub fn file_name(&self) -> &str {
        match self {
            Self::FileTooLarge { name, .. } | Self::FileUnreadable { name, .. } => name,
        }
    }
}

// =============================================================================
// Merge Errors
// =============================================================================

/// Reason a file was skipped by the merger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Column sequence differs from the established merge schema.
    #[error("File '{name}' has different columns. Skipped.")]
    SchemaMismatch {
        name: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

// =============================================================================
// Lookup Errors
// =============================================================================

/// Errors raised by the lookup engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// A requested key or value column is absent.
    #[error("Column '{column}' not found in {table} table")]
    LookupColumnMissing { table: String, column: String },

    /// The join/map step failed for one value column.
    #[error("Mapping failed for column '{column}': {message}")]
    LookupComputeFailure { column: String, message: String },

    /// No value columns were requested.
    #[error("Select at least one column to bring in")]
    EmptyValueColumns,
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while encoding a table for download.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// A cell position does not fit the worksheet's index types.
    #[error("Cell at row {row}, column {col} is outside the worksheet")]
    OutOfSheet { row: usize, col: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Session Errors (top-level)
// =============================================================================

/// Top-level session orchestration errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// No merged rows are available.
    #[error("No rows were merged; upload at least one readable file")]
    NothingMerged,

    /// Lookup requested before a mapping file was loaded.
    #[error("No mapping file loaded")]
    NoMapping,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type ReadResult<T> = Result<T, ReadError>;

pub type LookupResult<T> = Result<T, LookupError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type SessionResult<T> = Result<T, SessionError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let read_err = ReadError::unreadable("a.csv", "bad quote");
        let file_err: FileError = read_err.clone().into();
        assert!(file_err.to_string().contains("a.csv"));

        let session_err: SessionError = read_err.into();
        assert!(session_err.to_string().contains("bad quote"));

        let lookup_err = LookupError::LookupColumnMissing {
            table: "mapping".into(),
            column: "Region".into(),
        };
        let session_err: SessionError = lookup_err.into();
        assert!(session_err.to_string().contains("Region"));
    }

    #[test]
    fn test_diagnostic_messages_name_the_file() {
        let err = ReadError::FileTooLarge {
            name: "big.csv".into(),
            size: 2,
            limit: 1,
        };
        assert_eq!(err.file_name(), "big.csv");
        assert!(err.to_string().contains("big.csv"));

        let err = FileError::SchemaMismatch {
            name: "b.csv".into(),
            expected: vec!["a".into()],
            found: vec!["b".into()],
        };
        assert_eq!(err.to_string(), "File 'b.csv' has different columns. Skipped.");
    }
}
