//! Schema-checked concatenation of loaded tables.
//!
//! A fold over per-file load results: successes are appended to one
//! accumulator, failures become diagnostics, and nothing already merged is
//! ever discarded.
//!
//! Every file after the first has its first row dropped on the assumption
//! that it repeats the header. A second file whose first row is real data
//! loses that row.

use crate::error::{FileError, ReadError};
use crate::models::Table;

/// Why one file did not contribute rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDiagnostic {
    pub file: String,
    pub error: FileError,
}

impl std::fmt::Display for MergeDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Result of merging a batch of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged table; zero columns and rows if nothing was accepted.
    pub table: Table,
    /// Files whose rows were appended, in input order.
    pub accepted: Vec<String>,
    /// One entry per skipped or unreadable file.
    pub diagnostics: Vec<MergeDiagnostic>,
}

impl MergeOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Merged {} rows x {} columns from {} file(s), {} skipped",
            self.table.len(),
            self.table.width(),
            self.accepted.len(),
            self.diagnostics.len()
        )
    }
}

/// Incremental merger. Feed files in order with [`TableMerger::push`].
#[derive(Debug, Default)]
pub struct TableMerger {
    position: usize,
    outcome: MergeOutcome,
}

impl TableMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the next file's load result.
    ///
    /// Returns the diagnostic when the file is skipped.
    pub fn push(
        &mut self,
        file: impl Into<String>,
        loaded: Result<Table, ReadError>,
    ) -> Option<&MergeDiagnostic> {
        let file = file.into();
        let position = self.position;
        self.position += 1;

        let mut table = match loaded {
            Ok(table) => table,
            Err(err) => return self.reject(file, err.into()),
        };

        if position > 0 {
            table.drop_first_row();
        }

        let expected = self.outcome.table.columns();
        if !expected.is_empty() && table.columns() != expected {
            let error = FileError::SchemaMismatch {
                name: file.clone(),
                expected: expected.to_vec(),
                found: table.columns().to_vec(),
            };
            return self.reject(file, error);
        }

        self.outcome.table.append_rows(table);
        self.outcome.accepted.push(file);
        None
    }

    fn reject(&mut self, file: String, error: FileError) -> Option<&MergeDiagnostic> {
        self.outcome.diagnostics.push(MergeDiagnostic { file, error });
        self.outcome.diagnostics.last()
    }

    pub fn finish(self) -> MergeOutcome {
        self.outcome
    }
}

/// Merge a sequence of `(file name, load result)` pairs.
pub fn merge_tables<I, S>(inputs: I) -> MergeOutcome
where
    I: IntoIterator<Item = (S, Result<Table, ReadError>)>,
    S: Into<String>,
{
    let mut merger = TableMerger::new();
    for (file, loaded) in inputs {
        merger.push(file, loaded);
    }
    merger.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn table(cols: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            cols.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::text(*v)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_equal_schemas_concatenate_dropping_repeated_header() {
        let a = table(&["ID", "Name"], &[&["1", "Ann"], &["2", "Bo"]]);
        let b = table(&["ID", "Name"], &[&["ID", "Name"], &["3", "Cy"]]);

        let out = merge_tables(vec![("a.csv", Ok(a)), ("b.csv", Ok(b))]);

        assert_eq!(out.table.len(), 3);
        assert_eq!(out.table.columns(), &["ID".to_string(), "Name".to_string()][..]);
        assert_eq!(out.table.rows()[2][0], Cell::text("3"));
        assert_eq!(out.accepted, vec!["a.csv", "b.csv"]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_schema_mismatch_skipped_with_one_diagnostic() {
        let a = table(&["ID", "Name"], &[&["1", "Ann"]]);
        let b = table(&["Name", "ID"], &[&["x", "y"], &["Cy", "3"]]);

        let out = merge_tables(vec![("a.csv", Ok(a.clone())), ("b.csv", Ok(b))]);

        assert_eq!(out.table, a);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].file, "b.csv");
        assert!(matches!(out.diagnostics[0].error, FileError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_column_comparison_is_exact() {
        let a = table(&["ID"], &[&["1"]]);
        let b = table(&["id"], &[&["id"], &["2"]]);

        let out = merge_tables(vec![("a.csv", Ok(a)), ("b.csv", Ok(b))]);
        assert_eq!(out.table.len(), 1);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_unreadable_file_does_not_abort() {
        let a = table(&["ID"], &[&["1"]]);
        let c = table(&["ID"], &[&["ID"], &["3"]]);

        let out = merge_tables(vec![
            ("a.csv", Ok(a)),
            ("b.csv", Err(ReadError::unreadable("b.csv", "bad bytes"))),
            ("c.csv", Ok(c)),
        ]);

        assert_eq!(out.table.len(), 2);
        assert_eq!(out.accepted, vec!["a.csv", "c.csv"]);
        assert!(matches!(out.diagnostics[0].error, FileError::Read(_)));
    }

    #[test]
    fn test_first_row_dropped_by_position_even_after_failure() {
        let b = table(&["ID"], &[&["ID"], &["2"]]);

        let out = merge_tables(vec![
            ("a.csv", Err(ReadError::unreadable("a.csv", "bad"))),
            ("b.csv", Ok(b)),
        ]);

        assert_eq!(out.table.len(), 1);
        assert_eq!(out.table.rows()[0][0], Cell::text("2"));
    }

    #[test]
    fn test_all_failed_yields_empty_table() {
        let out = merge_tables(vec![(
            "a.csv",
            Err(ReadError::FileTooLarge { name: "a.csv".into(), size: 2, limit: 1 }),
        )]);

        assert_eq!(out.table.width(), 0);
        assert_eq!(out.table.len(), 0);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_incremental_push_reports_diagnostic() {
        let mut merger = TableMerger::new();
        assert!(merger.push("a.csv", Ok(table(&["A"], &[&["1"]]))).is_none());

        let diag = merger.push("b.csv", Ok(table(&["B"], &[&["B"], &["2"]])));
        assert_eq!(diag.map(|d| d.file.as_str()), Some("b.csv"));

        let out = merger.finish();
        assert!(out.summary().contains("1 rows"));
    }
}
