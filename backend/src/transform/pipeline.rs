//! High-level pipeline API: load files, merge them, run lookups.
//!
//! Wraps the pure engine pieces with header normalization and diagnostic
//! logging. Every skipped file and failed value column is logged as a
//! one-line message and returned to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabmerge::pipeline::{merge_paths, run_lookup};
//!
//! let outcome = merge_paths(&["jan.csv".into(), "feb.csv".into()], MAX_FILE_BYTES);
//! println!("{}", outcome.summary());
//! ```

use std::path::{Path, PathBuf};

use super::lookup::{perform_lookup, LookupOutcome};
use super::merger::{MergeOutcome, TableMerger};
use super::normalize::{normalize_input_columns, normalize_mapping_columns};
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{LookupResult, ReadResult};
use crate::models::{LookupRequest, Table};
use crate::parser::{load_table, load_table_file};

/// Load one input file and clean its headers (blank + trim, no dedup).
pub fn load_input(name: &str, bytes: &[u8], limit: u64) -> ReadResult<Table> {
    let mut table = load_table(name, bytes, limit)?;
    table.rename_columns(normalize_input_columns(table.columns()));
    Ok(table)
}

/// Load the mapping file and clean + deduplicate its headers.
pub fn load_mapping(name: &str, bytes: &[u8], limit: u64) -> ReadResult<Table> {
    let mut table = load_table(name, bytes, limit)?;
    table.rename_columns(normalize_mapping_columns(table.columns()));
    Ok(table)
}

/// Same as [`load_mapping`] for a file on disk.
pub fn load_mapping_file(path: &Path, limit: u64) -> ReadResult<Table> {
    let mut table = load_table_file(path, limit)?;
    table.rename_columns(normalize_mapping_columns(table.columns()));
    Ok(table)
}

/// Merge in-memory files in upload order.
pub fn merge_files<N, B>(files: &[(N, B)], limit: u64) -> MergeOutcome
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    log_info(format!("📂 Merging {} file(s)...", files.len()));
    let mut merger = TableMerger::new();

    for (name, bytes) in files {
        let name = name.as_ref();
        let loaded = load_input(name, bytes.as_ref(), limit);
        report_file(&mut merger, name, loaded);
    }

    finish_merge(merger)
}

/// Merge files on disk in the given order.
pub fn merge_paths(paths: &[PathBuf], limit: u64) -> MergeOutcome {
    log_info(format!("📂 Merging {} file(s)...", paths.len()));
    let mut merger = TableMerger::new();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let loaded = load_table_file(path, limit).map(|mut table| {
            table.rename_columns(normalize_input_columns(table.columns()));
            table
        });
        report_file(&mut merger, &name, loaded);
    }

    finish_merge(merger)
}

fn report_file(merger: &mut TableMerger, name: &str, loaded: ReadResult<Table>) {
    let rows = loaded.as_ref().map(Table::len).ok();
    match merger.push(name, loaded) {
        Some(diag) => log_warning(diag.to_string()),
        None => log_info_indent(format!("{} ({} rows)", name, rows.unwrap_or_default()), 1),
    }
}

fn finish_merge(merger: TableMerger) -> MergeOutcome {
    let outcome = merger.finish();
    if outcome.table.is_empty() {
        log_error("No rows were merged");
    } else {
        log_success(outcome.summary());
    }
    outcome
}

/// Run a lookup and log each failed value column.
pub fn run_lookup(
    table: &mut Table,
    mapping: &Table,
    request: &LookupRequest,
) -> LookupResult<LookupOutcome> {
    log_info(format!(
        "🔁 Lookup ({}) {} ⇄ {} for [{}]",
        request.method,
        request.key_col_main,
        request.key_col_map,
        request.value_cols.join(", ")
    ));

    let outcome = perform_lookup(table, mapping, request).map_err(|e| {
        log_error(e.to_string());
        e
    })?;

    for failure in &outcome.failures {
        log_error(failure.to_string());
    }
    if outcome.rows_after != outcome.rows_before {
        log_warning(format!(
            "Row count changed from {} to {} (duplicate mapping keys)",
            outcome.rows_before, outcome.rows_after
        ));
    }
    if !outcome.mapped_columns.is_empty() {
        log_success(format!("Lookup completed: {}", outcome.mapped_columns.join(", ")));
    }

    Ok(outcome)
}
