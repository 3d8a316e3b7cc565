//! Domain models for the Tabmerge pipeline.
//!
//! - [`Cell`] - a single value, either text or missing
//! - [`Table`] - ordered named columns over position-aligned rows
//! - [`MatchMethod`] - lookup strategy (exact-merge or first-match-map)
//! - [`LookupRequest`] - what to look up and how
//! - [`OutputFormat`] - export format selector

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder written into every lookup miss.
pub const NOT_MATCHED: &str = "Not Matched";

/// Suffix appended to a mapping column name to form the injected column.
pub const MAPPED_SUFFIX: &str = "_mapped";

// =============================================================================
// Cell
// =============================================================================

/// A single table value.
///
/// Serialized as a JSON string, or `null` when missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Missing,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Empty strings become [`Cell::Missing`].
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Missing => None,
        }
    }

    /// String form used for display and export; missing is empty.
    pub fn to_text(&self) -> String {
        self.as_str().unwrap_or_default().to_string()
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

// =============================================================================
// Table
// =============================================================================

/// Error building a table from ragged rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaggedRow {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

impl fmt::Display for RaggedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row {} has {} fields, expected {}",
            self.row + 1,
            self.found,
            self.expected
        )
    }
}

impl std::error::Error for RaggedRow {}

/// In-memory table: ordered column names and rows aligned by position.
///
/// Every row has exactly `columns().len()` cells. Column names may repeat
/// (input tables are not deduplicated); name lookups resolve to the first
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Empty table with the given columns and no rows.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, rejecting any row whose width differs from the header.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, RaggedRow> {
        let expected = columns.len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(RaggedRow {
                row,
                expected,
                found: r.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Mutable cells of one column.
    pub fn column_values_mut(&mut self, name: &str) -> Option<impl Iterator<Item = &mut Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter_mut().map(move |r| &mut r[idx]))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Projection onto the named columns, in the given order. Unknown names are skipped.
    pub fn select(&self, names: &[String]) -> Table {
        let picked: Vec<(usize, &String)> = names
            .iter()
            .filter_map(|n| self.column_index(n).map(|i| (i, n)))
            .collect();
        Table {
            columns: picked.iter().map(|(_, n)| (*n).clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| picked.iter().map(|(i, _)| r[*i].clone()).collect())
                .collect(),
        }
    }

    pub fn rename_columns(&mut self, columns: Vec<String>) {
        debug_assert_eq!(columns.len(), self.columns.len());
        self.columns = columns;
    }

    /// Remove the first row, if any.
    pub fn drop_first_row(&mut self) {
        if !self.rows.is_empty() {
            self.rows.remove(0);
        }
    }

    /// Append another table's rows. Callers check schema equality first.
    pub fn append_rows(&mut self, other: Table) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
    }

    /// Replace every row. Widths must match the current columns.
    pub fn replace_rows(&mut self, rows: Vec<Vec<Cell>>) {
        debug_assert!(rows.iter().all(|r| r.len() == self.columns.len()));
        self.rows = rows;
    }

    /// Insert a column at `index`; `values` is padded with missing cells
    /// or truncated to the row count.
    pub fn insert_column(&mut self, index: usize, name: impl Into<String>, mut values: Vec<Cell>) {
        let index = index.min(self.columns.len());
        values.resize(self.rows.len(), Cell::Missing);
        self.columns.insert(index, name.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(index, value);
        }
    }

    /// Append a column after the last one.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Cell>) {
        let end = self.columns.len();
        self.insert_column(end, name, values);
    }

    /// Remove a column by name, returning its values.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        let idx = self.column_index(name)?;
        self.columns.remove(idx);
        Some(self.rows.iter_mut().map(|r| r.remove(idx)).collect())
    }
}

// =============================================================================
// Lookup request
// =============================================================================

/// Lookup matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Left join; duplicate mapping keys fan out into extra rows.
    #[default]
    Merge,
    /// Dictionary lookup; last duplicate key wins, row count unchanged.
    Map,
}

impl FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "map" => Ok(Self::Map),
            other => Err(format!("Unknown lookup method '{}' (expected merge or map)", other)),
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Merge => "merge",
            Self::Map => "map",
        })
    }
}

/// A multi-column lookup of the merged table against the mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    /// Key column in the merged table.
    pub key_col_main: String,
    /// Key column in the mapping table.
    pub key_col_map: String,
    /// Mapping columns to bring in, in output order.
    pub value_cols: Vec<String>,
    #[serde(default)]
    pub method: MatchMethod,
}

/// Name of the column injected for a mapping column.
pub fn mapped_column_name(value_col: &str) -> String {
    format!("{}{}", value_col, MAPPED_SUFFIX)
}

// =============================================================================
// Output format
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    #[default]
    Xlsx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(format!("Unknown format '{}' (expected csv or xlsx)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = Table::from_rows(cols(&["a", "b"]), vec![vec!["1".into()]]).unwrap_err();
        assert_eq!(err.expected, 2);
        assert_eq!(err.found, 1);
    }

    #[test]
    fn test_duplicate_names_resolve_to_first() {
        let table = Table::from_rows(
            cols(&["", ""]),
            vec![vec!["left".into(), "right".into()]],
        )
        .unwrap();
        assert_eq!(table.column_index(""), Some(0));
        assert_eq!(table.column_values("").unwrap(), vec![&Cell::text("left")]);
    }

    #[test]
    fn test_insert_and_remove_column() {
        let mut table = Table::from_rows(
            cols(&["a", "b"]),
            vec![vec!["1".into(), "2".into()], vec!["3".into(), "4".into()]],
        )
        .unwrap();

        table.insert_column(0, "z", vec!["x".into()]);
        assert_eq!(table.columns(), &cols(&["z", "a", "b"])[..]);
        assert_eq!(table.rows()[1][0], Cell::Missing);

        let removed = table.remove_column("a").unwrap();
        assert_eq!(removed, vec![Cell::text("1"), Cell::text("3")]);
        assert_eq!(table.columns(), &cols(&["z", "b"])[..]);
        assert!(table.remove_column("nope").is_none());
    }

    #[test]
    fn test_select_and_head() {
        let table = Table::from_rows(
            cols(&["a", "b", "c"]),
            vec![
                vec!["1".into(), "2".into(), "3".into()],
                vec!["4".into(), "5".into(), "6".into()],
            ],
        )
        .unwrap();

        let picked = table.select(&cols(&["c", "missing", "a"]));
        assert_eq!(picked.columns(), &cols(&["c", "a"])[..]);
        assert_eq!(picked.rows()[1], vec![Cell::text("6"), Cell::text("4")]);
        assert_eq!(table.head(1).len(), 1);
    }

    #[test]
    fn test_is_empty() {
        assert!(Table::default().is_empty());
        assert!(Table::new(cols(&["a"])).is_empty());
    }

    #[test]
    fn test_cell_serialization() {
        let row = vec![Cell::text("Bob"), Cell::Missing];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["Bob",null]"#);
    }

    #[test]
    fn test_request_wire_format() {
        let req: LookupRequest = serde_json::from_str(
            r#"{"keyColMain":"ID","keyColMap":"Code","valueCols":["Region"],"method":"map"}"#,
        )
        .unwrap();
        assert_eq!(req.key_col_main, "ID");
        assert_eq!(req.method, MatchMethod::Map);
    }

    #[test]
    fn test_parse_method_and_format() {
        assert_eq!("MERGE".parse::<MatchMethod>(), Ok(MatchMethod::Merge));
        assert!("fuzzy".parse::<MatchMethod>().is_err());
        assert_eq!(".xlsx".parse::<OutputFormat>(), Ok(OutputFormat::Xlsx));
        assert_eq!(mapped_column_name("Region"), "Region_mapped");
    }
}
