//! Column label cleanup.
//!
//! Input tables only get placeholder blanking and trimming, so schema
//! equality stays exact. Mapping tables are also deduplicated because any of
//! their columns can be picked by name.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Placeholder labels produced for header cells that had no text.
static PLACEHOLDER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^Unnamed: \d+").ok());

/// True when a raw label means "no original header".
pub fn is_placeholder(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || PLACEHOLDER.as_ref().is_some_and(|re| re.is_match(trimmed))
}

/// Blank placeholders and trim every other label. Length and order are kept.
pub fn normalize_input_columns<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|name| {
            let name = name.as_ref();
            if is_placeholder(name) {
                String::new()
            } else {
                name.trim().to_string()
            }
        })
        .collect()
}

/// Suffix repeated labels with `_1`, `_2`, ... in first-seen order.
///
/// The first occurrence keeps its label. Counting is on the label as given,
/// so `["x", "x", "x"]` becomes `["x", "x_1", "x_2"]`.
pub fn deduplicate_columns<S: AsRef<str>>(cols: &[S]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    cols.iter()
        .map(|col| {
            let col = col.as_ref();
            let count = seen.entry(col).or_insert(0);
            let name = if *count == 0 {
                col.to_string()
            } else {
                format!("{}_{}", col, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Input normalization followed by deduplication.
pub fn normalize_mapping_columns<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    deduplicate_columns(&normalize_input_columns(raw))
}
