//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FileError, ReadError};
use crate::models::{Cell, OutputFormat, Table};
use crate::transform::{LookupOutcome, MergeDiagnostic, MergeOutcome};

/// First rows of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl From<Table> for TablePreview {
    fn from(table: Table) -> Self {
        TablePreview {
            columns: table.columns().to_vec(),
            rows: table.rows().to_vec(),
        }
    }
}

/// Why a file was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiagnostic {
    pub file: String,
    /// "tooLarge", "unreadable" or "schemaMismatch"
    pub kind: String,
    pub message: String,
}

impl From<&MergeDiagnostic> for FileDiagnostic {
    fn from(diag: &MergeDiagnostic) -> Self {
        let kind = match &diag.error {
            FileError::Read(ReadError::FileTooLarge { .. }) => "tooLarge",
            FileError::Read(ReadError::FileUnreadable { .. }) => "unreadable",
            FileError::SchemaMismatch { .. } => "schemaMismatch",
        };
        FileDiagnostic {
            file: diag.file.clone(),
            kind: kind.to_string(),
            message: diag.error.to_string(),
        }
    }
}

/// Response to `POST /api/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub session_id: String,
    /// "ready", "warning" (some files skipped) or "error" (nothing merged)
    pub status: String,
    pub accepted: Vec<String>,
    pub skipped: Vec<FileDiagnostic>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub preview: TablePreview,
}

impl MergeResponse {
    pub fn new(session_id: String, outcome: &MergeOutcome, preview_rows: usize) -> Self {
        let status = if outcome.table.is_empty() {
            "error"
        } else if outcome.diagnostics.is_empty() {
            "ready"
        } else {
            "warning"
        };
        MergeResponse {
            session_id,
            status: status.to_string(),
            accepted: outcome.accepted.clone(),
            skipped: outcome.diagnostics.iter().map(FileDiagnostic::from).collect(),
            row_count: outcome.table.len(),
            columns: outcome.table.columns().to_vec(),
            preview: outcome.table.head(preview_rows).into(),
        }
    }
}

/// Response to `POST /api/mapping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResponse {
    pub file: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// Response to `POST /api/lookup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    /// "ready" or "warning" (some value columns failed)
    pub status: String,
    pub mapped_columns: Vec<String>,
    pub failures: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub preview: Option<TablePreview>,
}

impl LookupResponse {
    pub fn new(outcome: &LookupOutcome, preview: Option<Table>) -> Self {
        LookupResponse {
            status: if outcome.is_complete() { "ready" } else { "warning" }.to_string(),
            mapped_columns: outcome.mapped_columns.clone(),
            failures: outcome.failures.iter().map(|e| e.to_string()).collect(),
            rows_before: outcome.rows_before,
            rows_after: outcome.rows_after,
            preview: preview.map(TablePreview::from),
        }
    }
}

/// Query string of `GET /api/export`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: OutputFormat,
    pub filename: Option<String>,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
