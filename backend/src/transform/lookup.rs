//! Multi-column key lookup of the merged table against a mapping table.
//!
//! # Contract
//!
//! 1. The merged table's key column is rewritten in place to lookup-key form
//!    (stringified, trimmed, uppercased). Callers see the normalized keys
//!    afterwards. The mapping table is never mutated; its keys are
//!    normalized on the fly while the index is built.
//! 2. Each requested value column produces `<value>_mapped`:
//!    - [`MatchMethod::Merge`]: left join. Duplicate mapping keys fan out
//!      into one output row per match, in mapping order.
//!    - [`MatchMethod::Map`]: dictionary lookup. The last duplicate key wins
//!      and the row count never changes.
//!
//!    Misses, and matches whose mapping value is missing, get
//!    [`NOT_MATCHED`]. A failing value column is reported and skipped.
//! 3. The new columns move to the front in request order.

use std::collections::{HashMap, HashSet};

use crate::error::{LookupError, LookupResult};
use crate::models::{mapped_column_name, Cell, LookupRequest, MatchMethod, Table, NOT_MATCHED};

const MERGED: &str = "merged";
const MAPPING: &str = "mapping";

/// What a lookup did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOutcome {
    /// Injected columns, in request order.
    pub mapped_columns: Vec<String>,
    /// Per-value-column failures; the other columns still went through.
    pub failures: Vec<LookupError>,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl LookupOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lookup-key form of a cell. Missing cells become the empty key.
pub fn normalize_key(cell: &Cell) -> String {
    cell.as_str().unwrap_or_default().trim().to_uppercase()
}

/// Rewrite one column to lookup-key form. Returns false if the column is absent.
///
/// Idempotent: normalizing an already normalized column changes nothing.
pub fn normalize_key_column(table: &mut Table, column: &str) -> bool {
    match table.column_values_mut(column) {
        Some(cells) => {
            for cell in cells {
                *cell = Cell::Text(normalize_key(cell));
            }
            true
        }
        None => false,
    }
}

/// Run a lookup request against `table` in place.
///
/// Fails as a whole only when a key column is absent or no value columns were
/// requested; in that case `table` is left untouched.
pub fn perform_lookup(
    table: &mut Table,
    mapping: &Table,
    request: &LookupRequest,
) -> LookupResult<LookupOutcome> {
    if request.value_cols.is_empty() {
        return Err(LookupError::EmptyValueColumns);
    }
    if !table.has_column(&request.key_col_main) {
        return Err(missing(MERGED, &request.key_col_main));
    }
    let map_key_idx = mapping
        .column_index(&request.key_col_map)
        .ok_or_else(|| missing(MAPPING, &request.key_col_map))?;

    let mut outcome = LookupOutcome {
        rows_before: table.len(),
        ..Default::default()
    };

    normalize_key_column(table, &request.key_col_main);
    let map_keys: Vec<String> = mapping
        .rows()
        .iter()
        .map(|row| normalize_key(&row[map_key_idx]))
        .collect();

    // Repeats are computed once; a second merge pass would fan out again
    let mut seen = HashSet::new();
    for value_col in request.value_cols.iter().filter(|v| seen.insert(v.as_str())) {
        match lookup_column(table, mapping, &map_keys, request, value_col) {
            Ok(name) => outcome.mapped_columns.push(name),
            Err(err) => outcome.failures.push(err),
        }
    }

    move_to_front(table, &outcome.mapped_columns);
    outcome.rows_after = table.len();
    Ok(outcome)
}

/// Inject `<value_col>_mapped` for one value column.
fn lookup_column(
    table: &mut Table,
    mapping: &Table,
    map_keys: &[String],
    request: &LookupRequest,
    value_col: &str,
) -> LookupResult<String> {
    let value_idx = mapping
        .column_index(value_col)
        .ok_or_else(|| missing(MAPPING, value_col))?;

    if value_col == request.key_col_map {
        return Err(compute_failure(value_col, "value column is the mapping key column"));
    }

    let new_col = mapped_column_name(value_col);
    if new_col == request.key_col_main {
        return Err(compute_failure(value_col, "result would overwrite the key column"));
    }

    // A previous lookup of the same column is replaced
    table.remove_column(&new_col);

    let key_idx = table
        .column_index(&request.key_col_main)
        .ok_or_else(|| missing(MERGED, &request.key_col_main))?;

    let pairs = map_keys
        .iter()
        .map(String::as_str)
        .zip(mapping.rows().iter().map(|row| &row[value_idx]));

    match request.method {
        MatchMethod::Map => {
            let dict: HashMap<&str, &Cell> = pairs.collect();
            let values: Vec<Cell> = table
                .rows()
                .iter()
                .map(|row| resolve(dict.get(key_of(&row[key_idx])).copied()))
                .collect();
            table.push_column(new_col.clone(), values);
        }
        MatchMethod::Merge => {
            let mut index: HashMap<&str, Vec<&Cell>> = HashMap::new();
            for (key, value) in pairs {
                index.entry(key).or_default().push(value);
            }

            let mut rows = Vec::with_capacity(table.len());
            for row in table.rows() {
                match index.get(key_of(&row[key_idx])) {
                    Some(matches) => {
                        for value in matches {
                            rows.push(extend_row(row, resolve(Some(*value))));
                        }
                    }
                    None => rows.push(extend_row(row, resolve(None))),
                }
            }

            table.push_column(new_col.clone(), Vec::new());
            table.replace_rows(rows);
        }
    }

    Ok(new_col)
}

/// Move `columns` to the front, keeping their given order.
fn move_to_front(table: &mut Table, columns: &[String]) {
    for col in columns.iter().rev() {
        if let Some(values) = table.remove_column(col) {
            table.insert_column(0, col.clone(), values);
        }
    }
}

fn key_of(cell: &Cell) -> &str {
    cell.as_str().unwrap_or_default()
}

fn resolve(found: Option<&Cell>) -> Cell {
    match found {
        Some(Cell::Text(s)) if !s.is_empty() => Cell::Text(s.clone()),
        _ => Cell::text(NOT_MATCHED),
    }
}

fn extend_row(row: &[Cell], value: Cell) -> Vec<Cell> {
    let mut out = Vec::with_capacity(row.len() + 1);
    out.extend_from_slice(row);
    out.push(value);
    out
}

fn missing(table: &str, column: &str) -> LookupError {
    LookupError::LookupColumnMissing {
        table: table.to_string(),
        column: column.to_string(),
    }
}

fn compute_failure(column: &str, message: &str) -> LookupError {
    LookupError::LookupComputeFailure {
        column: column.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cols: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            cols.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from_field(v)).collect())
                .collect(),
        )
        .unwrap()
    }

    fn request(key_main: &str, key_map: &str, values: &[&str], method: MatchMethod) -> LookupRequest {
        LookupRequest {
            key_col_main: key_main.into(),
            key_col_map: key_map.into(),
            value_cols: values.iter().map(|s| s.to_string()).collect(),
            method,
        }
    }

    fn column(table: &Table, name: &str) -> Vec<String> {
        table
            .column_values(name)
            .unwrap()
            .into_iter()
            .map(|c| c.to_text())
            .collect()
    }

    #[test]
    fn test_keys_normalized_before_matching() {
        let mut t = table(&["ID"], &[&["a1"], &["A1 "]]);
        let m = table(&["ID", "Name"], &[&["A1", "Bob"]]);

        let out = perform_lookup(&mut t, &m, &request("ID", "ID", &["Name"], MatchMethod::Map)).unwrap();

        assert_eq!(out.mapped_columns, vec!["Name_mapped"]);
        assert_eq!(column(&t, "Name_mapped"), vec!["Bob", "Bob"]);
        assert_eq!(column(&t, "ID"), vec!["A1", "A1"]);
    }

    #[test]
    fn test_map_keeps_row_count_and_last_duplicate_wins() {
        let mut t = table(&["Code", "Qty"], &[&["k", "1"], &["x", "2"], &["K", "3"]]);
        let m = table(&["Code", "Region"], &[&["K", "North"], &["k", "South"]]);

        let out = perform_lookup(&mut t, &m, &request("Code", "Code", &["Region"], MatchMethod::Map)).unwrap();

        assert_eq!(out.rows_before, 3);
        assert_eq!(out.rows_after, 3);
        assert_eq!(column(&t, "Region_mapped"), vec!["South", NOT_MATCHED, "South"]);
    }

    #[test]
    fn test_merge_fans_out_on_duplicate_keys() {
        let mut t = table(&["Code"], &[&["k"]]);
        let m = table(&["Code", "Region"], &[&["k", "v1"], &["K", "v2"]]);

        let out = perform_lookup(&mut t, &m, &request("Code", "Code", &["Region"], MatchMethod::Merge)).unwrap();

        assert_eq!(out.rows_after, 2);
        assert_eq!(column(&t, "Region_mapped"), vec!["v1", "v2"]);
        assert_eq!(column(&t, "Code"), vec!["K", "K"]);
    }

    #[test]
    fn test_repeated_value_column_joined_once() {
        let mut t = table(&["Code"], &[&["k"]]);
        let m = table(&["Code", "Region"], &[&["k", "v1"], &["K", "v2"]]);

        let out = perform_lookup(
            &mut t,
            &m,
            &request("Code", "Code", &["Region", "Region"], MatchMethod::Merge),
        )
        .unwrap();

        assert_eq!(out.mapped_columns, vec!["Region_mapped"]);
        assert_eq!(out.rows_after, 2);
        assert_eq!(column(&t, "Region_mapped"), vec!["v1", "v2"]);
        assert_eq!(t.width(), 2);
    }

    #[test]
    fn test_merge_preserves_left_order() {
        let mut t = table(&["Code", "N"], &[&["b", "1"], &["z", "2"], &["a", "3"]]);
        let m = table(&["Code", "V"], &[&["a", "A"], &["b", "B"]]);

        perform_lookup(&mut t, &m, &request("Code", "Code", &["V"], MatchMethod::Merge)).unwrap();

        assert_eq!(column(&t, "N"), vec!["1", "2", "3"]);
        assert_eq!(column(&t, "V_mapped"), vec!["B", NOT_MATCHED, "A"]);
    }

    #[test]
    fn test_unmatched_and_missing_values_get_sentinel() {
        let t = table(&["Code"], &[&["a"], &["b"]]);
        let m = table(&["Code", "Region"], &[&["a", ""]]);

        for method in [MatchMethod::Map, MatchMethod::Merge] {
            let mut t = t.clone();
            perform_lookup(&mut t, &m, &request("Code", "Code", &["Region"], method)).unwrap();
            assert_eq!(column(&t, "Region_mapped"), vec![NOT_MATCHED, NOT_MATCHED]);
            assert!(t.column_values("Region_mapped").unwrap().iter().all(|c| !c.is_missing()));
        }
    }

    #[test]
    fn test_key_normalization_idempotent() {
        let mut once = table(&["ID"], &[&[" ab "], &[""], &["Cd"]]);
        normalize_key_column(&mut once, "ID");
        let mut twice = once.clone();
        normalize_key_column(&mut twice, "ID");

        assert_eq!(once, twice);
        assert_eq!(column(&once, "ID"), vec!["AB", "", "CD"]);
        assert!(!normalize_key_column(&mut once, "nope"));
    }

    #[test]
    fn test_mapped_columns_moved_to_front_in_request_order() {
        let mut t = table(&["A", "ID", "B"], &[&["1", "x", "2"]]);
        let m = table(&["ID", "Manager", "Region"], &[&["X", "Ann", "West"]]);

        perform_lookup(
            &mut t,
            &m,
            &request("ID", "ID", &["Region", "Manager"], MatchMethod::Map),
        )
        .unwrap();

        assert_eq!(
            t.columns(),
            &["Region_mapped", "Manager_mapped", "A", "ID", "B"].map(String::from)[..]
        );
        assert_eq!(t.rows()[0][0], Cell::text("West"));
    }

    #[test]
    fn test_missing_key_column_leaves_table_untouched() {
        let mut t = table(&["ID"], &[&[" a "]]);
        let original = t.clone();
        let m = table(&["Code", "V"], &[&["A", "1"]]);

        let err = perform_lookup(&mut t, &m, &request("ID", "Nope", &["V"], MatchMethod::Map)).unwrap_err();
        assert!(matches!(err, LookupError::LookupColumnMissing { ref table, .. } if table == "mapping"));

        let err = perform_lookup(&mut t, &m, &request("Nope", "Code", &["V"], MatchMethod::Map)).unwrap_err();
        assert!(matches!(err, LookupError::LookupColumnMissing { ref table, .. } if table == "merged"));

        let err = perform_lookup(&mut t, &m, &request("ID", "Code", &[], MatchMethod::Map)).unwrap_err();
        assert_eq!(err, LookupError::EmptyValueColumns);
        assert_eq!(t, original);
    }

    #[test]
    fn test_failing_value_column_does_not_stop_others() {
        let mut t = table(&["ID"], &[&["a"]]);
        let m = table(&["ID", "Region", "Manager"], &[&["A", "West", "Ann"]]);

        let out = perform_lookup(
            &mut t,
            &m,
            &request("ID", "ID", &["Region", "Ghost", "ID", "Manager"], MatchMethod::Merge),
        )
        .unwrap();

        assert_eq!(out.mapped_columns, vec!["Region_mapped", "Manager_mapped"]);
        assert_eq!(out.failures.len(), 2);
        assert!(!out.is_complete());
        assert!(matches!(out.failures[0], LookupError::LookupColumnMissing { .. }));
        assert!(matches!(out.failures[1], LookupError::LookupComputeFailure { .. }));
        assert_eq!(t.columns()[..2], ["Region_mapped", "Manager_mapped"].map(String::from));
    }

    #[test]
    fn test_rerun_replaces_previous_mapped_column() {
        let mut t = table(&["ID"], &[&["a"], &["b"]]);
        let m = table(&["ID", "Region"], &[&["A", "West"], &["B", "East"]]);
        let req = request("ID", "ID", &["Region"], MatchMethod::Map);

        perform_lookup(&mut t, &m, &req).unwrap();
        perform_lookup(&mut t, &m, &req).unwrap();

        assert_eq!(t.columns(), &["Region_mapped", "ID"].map(String::from)[..]);
        assert_eq!(column(&t, "Region_mapped"), vec!["West", "East"]);
    }

    #[test]
    fn test_mapping_table_not_mutated() {
        let mut t = table(&["ID"], &[&["a"]]);
        let m = table(&["ID", "Region"], &[&[" a ", "West"]]);
        let before = m.clone();

        perform_lookup(&mut t, &m, &request("ID", "ID", &["Region"], MatchMethod::Merge)).unwrap();

        assert_eq!(m, before);
        assert_eq!(column(&t, "Region_mapped"), vec!["West"]);
    }

    #[test]
    fn test_different_key_names() {
        let mut t = table(&["Customer", "Amount"], &[&["c-1", "10"]]);
        let m = table(&["Id", "Tier"], &[&["C-1", "Gold"]]);

        let out = perform_lookup(&mut t, &m, &request("Customer", "Id", &["Tier"], MatchMethod::Merge)).unwrap();

        assert_eq!(t.width(), 3);
        assert_eq!(out.rows_after, 1);
        assert_eq!(column(&t, "Tier_mapped"), vec!["Gold"]);
    }
}
