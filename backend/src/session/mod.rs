//! Session state: the merged table, the mapping table and lookup progress.
//!
//! One session is the single owner of the merged table. Operations run one
//! at a time to completion; [`Session::reset`] discards everything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::logs::{log_error, log_info, log_success};
use crate::config::Config;
use crate::error::{SessionError, SessionResult};
use crate::export::{export_table, Exported, DEFAULT_LOOKUP_NAME, DEFAULT_MERGED_NAME};
use crate::models::{LookupRequest, OutputFormat, Table};
use crate::transform::pipeline::{load_mapping, merge_files, run_lookup};
use crate::transform::{LookupOutcome, MergeOutcome};

/// Mapping file as loaded, headers deduplicated.
#[derive(Debug, Clone)]
pub struct MappingTable {
    pub name: String,
    pub table: Table,
}

/// Snapshot of a session for status displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub started_at: String,
    pub merged_rows: usize,
    pub merged_columns: Vec<String>,
    pub mapping_file: Option<String>,
    pub mapping_columns: Vec<String>,
    pub lookup_done: bool,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: Config,
    merged: Option<MergeOutcome>,
    mapping: Option<MappingTable>,
    last_lookup: Option<LookupOutcome>,
}

impl Session {
    /// Start an empty session.
    pub fn initialize(config: Config) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            merged: None,
            mapping: None,
            last_lookup: None,
        }
    }

    /// Drop all state and start over with a new id.
    pub fn reset(&mut self) {
        *self = Self::initialize(self.config.clone());
        log_info(format!("🔁 Session reset ({})", self.id));
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Merge uploaded files, replacing any previous merged table.
    ///
    /// A previous lookup no longer applies and is forgotten; the mapping
    /// table is kept.
    pub fn load_inputs<N, B>(&mut self, files: &[(N, B)]) -> &MergeOutcome
    where
        N: AsRef<str>,
        B: AsRef<[u8]>,
    {
        self.last_lookup = None;
        &*self
            .merged
            .insert(merge_files(files, self.config.max_file_bytes))
    }

    pub fn merge_outcome(&self) -> Option<&MergeOutcome> {
        self.merged.as_ref()
    }

    /// Merged table, if any rows were merged.
    pub fn merged(&self) -> Option<&Table> {
        self.merged
            .as_ref()
            .map(|m| &m.table)
            .filter(|t| !t.is_empty())
    }

    /// Load the mapping file and return its (deduplicated) columns.
    pub fn load_mapping(&mut self, name: &str, bytes: &[u8]) -> SessionResult<&[String]> {
        let table = load_mapping(name, bytes, self.config.max_file_bytes).map_err(|e| {
            log_error(e.to_string());
            e
        })?;
        log_success(format!("📎 Mapping columns: {}", table.columns().join(", ")));

        let mapping = self.mapping.insert(MappingTable {
            name: name.to_string(),
            table,
        });
        Ok(mapping.table.columns())
    }

    pub fn mapping(&self) -> Option<&MappingTable> {
        self.mapping.as_ref()
    }

    /// Mapping columns selectable as values for a given mapping key.
    pub fn value_column_options(&self, key_col_map: &str) -> Vec<String> {
        self.mapping
            .as_ref()
            .map(|m| {
                m.table
                    .columns()
                    .iter()
                    .filter(|c| c.as_str() != key_col_map)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Run a lookup on the merged table.
    pub fn lookup(&mut self, request: &LookupRequest) -> SessionResult<&LookupOutcome> {
        let merged = self
            .merged
            .as_mut()
            .map(|m| &mut m.table)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::NothingMerged)?;
        let mapping = self.mapping.as_ref().ok_or(SessionError::NoMapping)?;

        let outcome = run_lookup(merged, &mapping.table, request)?;
        Ok(&*self.last_lookup.insert(outcome))
    }

    pub fn lookup_done(&self) -> bool {
        self.last_lookup.is_some()
    }

    pub fn last_lookup(&self) -> Option<&LookupOutcome> {
        self.last_lookup.as_ref()
    }

    /// First rows of the merged table. After a lookup, only the mapped
    /// columns and the key column are shown.
    pub fn preview(&self, key_col_main: Option<&str>) -> Option<Table> {
        let merged = self.merged()?;
        let rows = self.config.preview_rows;
        match (&self.last_lookup, key_col_main) {
            (Some(outcome), Some(key)) => {
                let mut columns = outcome.mapped_columns.clone();
                columns.push(key.to_string());
                Some(merged.select(&columns).head(rows))
            }
            _ => Some(merged.head(rows)),
        }
    }

    /// Encode the merged table for download.
    ///
    /// Without a filename, `after_lookup` is used once a lookup ran and
    /// `merged_file` otherwise.
    pub fn export(&self, format: OutputFormat, filename: Option<&str>) -> SessionResult<Exported> {
        let merged = self.merged().ok_or(SessionError::NothingMerged)?;
        let default_name = if self.lookup_done() {
            DEFAULT_LOOKUP_NAME
        } else {
            DEFAULT_MERGED_NAME
        };
        let name = filename
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(default_name);

        let exported = export_table(merged, format, name)?;
        log_success(format!(
            "⬇️  Exported {} ({} bytes)",
            exported.filename,
            exported.bytes.len()
        ));
        Ok(exported)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.to_string(),
            started_at: self.started_at.to_rfc3339(),
            merged_rows: self.merged().map(Table::len).unwrap_or_default(),
            merged_columns: self
                .merged()
                .map(|t| t.columns().to_vec())
                .unwrap_or_default(),
            mapping_file: self.mapping.as_ref().map(|m| m.name.clone()),
            mapping_columns: self
                .mapping
                .as_ref()
                .map(|m| m.table.columns().to_vec())
                .unwrap_or_default(),
            lookup_done: self.lookup_done(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initialize(Config::default())
    }
}
