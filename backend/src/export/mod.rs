//! Export adapter: encode a table as CSV or XLSX bytes for download.
//!
//! CSV is UTF-8 with the header on the first line and one line per row.
//! XLSX is a single sheet named `Data`: header row, then data rows, no
//! index column. Missing cells are written as empty fields / blank cells.

use rust_xlsxwriter::Workbook;

use crate::error::{ExportError, ExportResult};
use crate::models::{OutputFormat, Table};

/// Sheet name used for XLSX exports.
pub const SHEET_NAME: &str = "Data";

/// Default download name for the merged table.
pub const DEFAULT_MERGED_NAME: &str = "merged_file";

/// Default download name after a lookup.
pub const DEFAULT_LOOKUP_NAME: &str = "after_lookup";

/// Encoded payload plus the final file name.
#[derive(Debug, Clone)]
pub struct Exported {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub format: OutputFormat,
}

/// Append `.<ext>` unless the name already ends with it (case-insensitive).
pub fn with_extension(filename: &str, format: OutputFormat) -> String {
    let suffix = format!(".{}", format.extension());
    if filename.to_lowercase().ends_with(&suffix) {
        filename.to_string()
    } else {
        format!("{}{}", filename, suffix)
    }
}

/// Encode `table` in `format`, naming the result after `filename`.
pub fn export_table(table: &Table, format: OutputFormat, filename: &str) -> ExportResult<Exported> {
    let bytes = match format {
        OutputFormat::Csv => to_csv(table)?,
        OutputFormat::Xlsx => to_xlsx(table)?,
    };
    Ok(Exported {
        bytes,
        filename: with_extension(filename, format),
        format,
    })
}

/// CSV bytes, header first.
pub fn to_csv(table: &Table) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.as_str().unwrap_or_default()))?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// XLSX bytes with a single `Data` sheet.
pub fn to_xlsx(table: &Table) -> ExportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet().set_name(SHEET_NAME)?;

    for (col, name) in table.columns().iter().enumerate() {
        if !name.is_empty() {
            let (r, c) = sheet_position(0, col)?;
            worksheet.write_string(r, c, name)?;
        }
    }

    for (row_idx, row) in table.rows().iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            if let Some(text) = cell.as_str() {
                let (r, c) = sheet_position(row_idx + 1, col)?;
                worksheet.write_string(r, c, text)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn sheet_position(row: usize, col: usize) -> ExportResult<(u32, u16)> {
    match (u32::try_from(row), u16::try_from(col)) {
        (Ok(r), Ok(c)) => Ok((r, c)),
        _ => Err(ExportError::OutOfSheet { row, col }),
    }
}
