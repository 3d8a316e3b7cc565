//! Merge-and-lookup engine.
//!
//! - Normalize: column label cleanup and deduplication
//! - Merger: schema-checked concatenation of loaded tables
//! - Lookup: key-matched enrichment from a mapping table
//! - Pipeline: loading, logging and orchestration around the above

pub mod lookup;
pub mod merger;
pub mod normalize;
pub mod pipeline;

pub use lookup::{normalize_key, normalize_key_column, perform_lookup, LookupOutcome};
pub use merger::{merge_tables, MergeDiagnostic, MergeOutcome, TableMerger};
pub use normalize::{deduplicate_columns, normalize_input_columns, normalize_mapping_columns};
pub use pipeline::*;
