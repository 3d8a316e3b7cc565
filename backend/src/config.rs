//! Runtime configuration.
//!
//! Defaults suit local use; each value can be overridden from the
//! environment (a `.env` file is loaded by the binary first) and then by CLI
//! flags.
//!
//! | Variable                  | Default      |
//! |---------------------------|--------------|
//! | `TABMERGE_PORT`           | `3000`       |
//! | `TABMERGE_MAX_FILE_BYTES` | `1073741824` |
//! | `TABMERGE_PREVIEW_ROWS`   | `5`          |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::parser::MAX_FILE_BYTES;

/// HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Rows shown in previews.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub port: u16,
    /// Admission limit for a single input file.
    pub max_file_bytes: u64,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_file_bytes: MAX_FILE_BYTES,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl Config {
    /// Defaults overridden by `TABMERGE_*` variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var(&lookup, "TABMERGE_PORT").unwrap_or(defaults.port),
            max_file_bytes: parse_var(&lookup, "TABMERGE_MAX_FILE_BYTES")
                .unwrap_or(defaults.max_file_bytes),
            preview_rows: parse_var(&lookup, "TABMERGE_PREVIEW_ROWS")
                .unwrap_or(defaults.preview_rows),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_file_bytes, 1_073_741_824);
        assert_eq!(config.preview_rows, 5);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("TABMERGE_PORT", "8080"),
            ("TABMERGE_MAX_FILE_BYTES", "not-a-number"),
            ("TABMERGE_PREVIEW_ROWS", " 10 "),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.port, 8080);
        assert_eq!(config.max_file_bytes, MAX_FILE_BYTES);
        assert_eq!(config.preview_rows, 10);
    }
}
