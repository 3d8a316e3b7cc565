//! # Tabmerge - merge spreadsheets and enrich them with lookups
//!
//! Tabmerge stacks CSV/Excel files that share a header into one table, then
//! brings in columns from a mapping file by matching a key column.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / Excel │────▶│   Parser    │────▶│   Merger    │────▶│   Lookup    │
//! │   uploads   │     │  (auto-enc) │     │ (schema eq) │     │ (merge/map) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │   Export    │
//!                                                             │ (csv/xlsx)  │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabmerge::{merge_paths, run_lookup, load_mapping_file, LookupRequest, MAX_FILE_BYTES};
//!
//! let mut merged = merge_paths(&["jan.csv".into(), "feb.xlsx".into()], MAX_FILE_BYTES).table;
//! let mapping = load_mapping_file("regions.csv".as_ref(), MAX_FILE_BYTES)?;
//! let outcome = run_lookup(&mut merged, &mapping, &request)?;
//! println!("Added {}", outcome.mapped_columns.join(", "));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, tables and lookup requests
//! - [`parser`] - CSV/Excel loading with auto-detection
//! - [`transform`] - Header normalization, merging and lookup
//! - [`export`] - CSV/XLSX encoding for download
//! - [`session`] - Per-user state across operations
//! - [`config`] - Runtime configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod export;

// State
pub mod session;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError, FileError, LookupError, ReadError, ServerError, SessionError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    mapped_column_name, Cell, LookupRequest, MatchMethod, OutputFormat, Table, NOT_MATCHED,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, load_table, load_table_file,
    MAX_FILE_BYTES,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use transform::{
    merge_files, merge_paths, merge_tables, load_input, load_mapping, load_mapping_file,
    normalize_input_columns, normalize_key, normalize_mapping_columns, perform_lookup,
    run_lookup, LookupOutcome, MergeDiagnostic, MergeOutcome, TableMerger,
};

// =============================================================================
// Re-exports - Export, session, config
// =============================================================================

pub use config::Config;
pub use export::{export_table, Exported};
pub use session::{Session, SessionStatus};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
