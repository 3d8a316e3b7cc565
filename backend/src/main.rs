//! Tabmerge CLI - merge CSV/Excel files and enrich them with lookups
//!
//! # Commands
//!
//! ```bash
//! tabmerge serve                                  # Start HTTP server (port 3000)
//! tabmerge columns regions.xlsx --mapping         # List a file's columns
//! tabmerge merge jan.csv feb.csv -f csv           # Merge into merged_file.csv
//! tabmerge lookup jan.csv feb.csv \
//!     --mapping regions.xlsx --key-main ID --key-map Code \
//!     --value Region --value Manager --method map # Merge, then look up
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tabmerge::{
    export_table, load_mapping_file, load_table_file, merge_paths, normalize_input_columns,
    run_lookup, Config, LookupRequest, MatchMethod, OutputFormat, Table,
};
use tabmerge::export::{DEFAULT_LOOKUP_NAME, DEFAULT_MERGED_NAME};

#[derive(Parser)]
#[command(name = "tabmerge")]
#[command(about = "Merge CSV/Excel files and enrich them with lookups", long_about = None)]
struct Cli {
    /// Per-file size limit in bytes (overrides TABMERGE_MAX_FILE_BYTES)
    #[arg(long, global = true)]
    max_file_bytes: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the normalized columns of a file
    Columns {
        /// Input CSV or Excel file
        input: PathBuf,

        /// Normalize as a mapping file (deduplicated headers)
        #[arg(long)]
        mapping: bool,
    },

    /// Merge files with identical columns into one table
    Merge {
        /// Input files, in merge order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file name (extension added if missing)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format: csv or xlsx
        #[arg(short, long, default_value = "xlsx")]
        format: OutputFormat,
    },

    /// Merge files, then bring in columns from a mapping file
    Lookup {
        /// Input files, in merge order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Mapping file
        #[arg(short, long)]
        mapping: PathBuf,

        /// Key column in the merged table
        #[arg(long)]
        key_main: String,

        /// Key column in the mapping file
        #[arg(long)]
        key_map: String,

        /// Mapping column to bring in (repeatable)
        #[arg(short, long = "value", required = true)]
        values: Vec<String>,

        /// Strategy: merge (one row per mapping match) or map (last match wins)
        #[arg(long, default_value = "merge")]
        method: MatchMethod,

        /// Output file name (extension added if missing)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format: csv or xlsx
        #[arg(short, long, default_value = "xlsx")]
        format: OutputFormat,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides TABMERGE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(limit) = cli.max_file_bytes {
        config.max_file_bytes = limit;
    }

    let result = match cli.command {
        Commands::Columns { input, mapping } => cmd_columns(&input, mapping, &config),

        Commands::Merge {
            inputs,
            output,
            format,
        } => cmd_merge(&inputs, output.as_deref(), format, &config),

        Commands::Lookup {
            inputs,
            mapping,
            key_main,
            key_map,
            values,
            method,
            output,
            format,
        } => {
            let request = LookupRequest {
                key_col_main: key_main,
                key_col_map: key_map,
                value_cols: values,
                method,
            };
            cmd_lookup(&inputs, &mapping, &request, output.as_deref(), format, &config)
        }

        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            cmd_serve(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_columns(input: &Path, mapping: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());

    let table = if mapping {
        load_mapping_file(input, config.max_file_bytes)?
    } else {
        let mut table = load_table_file(input, config.max_file_bytes)?;
        table.rename_columns(normalize_input_columns(table.columns()));
        table
    };

    eprintln!("   Rows: {}", table.len());
    for column in table.columns() {
        println!("{}", column);
    }
    Ok(())
}

fn merge_inputs(inputs: &[PathBuf], config: &Config) -> Result<Table, Box<dyn std::error::Error>> {
    // Skipped files are already reported by the merge log.
    let outcome = merge_paths(inputs, config.max_file_bytes);
    if outcome.table.is_empty() {
        return Err("No rows were merged; check that the files are readable".into());
    }
    Ok(outcome.table)
}

fn cmd_merge(
    inputs: &[PathBuf],
    output: Option<&str>,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let merged = merge_inputs(inputs, config)?;
    write_output(&merged, output.unwrap_or(DEFAULT_MERGED_NAME), format)
}

fn cmd_lookup(
    inputs: &[PathBuf],
    mapping: &Path,
    request: &LookupRequest,
    output: Option<&str>,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut merged = merge_inputs(inputs, config)?;

    eprintln!("📎 Mapping: {}", mapping.display());
    let mapping = load_mapping_file(mapping, config.max_file_bytes)?;
    eprintln!("   Columns: {}", mapping.columns().join(", "));

    let outcome = run_lookup(&mut merged, &mapping, request)?;
    if outcome.mapped_columns.is_empty() {
        return Err("No value column could be mapped".into());
    }

    write_output(&merged, output.unwrap_or(DEFAULT_LOOKUP_NAME), format)
}

async fn cmd_serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tabmerge::server::start_server(config).await?;
    Ok(())
}

fn write_output(table: &Table, name: &str, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let exported = export_table(table, format, name)?;
    fs::write(&exported.filename, &exported.bytes)?;
    eprintln!("💾 Output written to: {}", exported.filename);
    Ok(())
}
