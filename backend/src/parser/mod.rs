//! Tabular file decoding: CSV (encoding and delimiter auto-detection) and Excel.
//!
//! Produces a [`Table`] with the raw header row as column names. Header
//! cleanup happens later in [`crate::transform::normalize`].

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::Path;

use crate::error::{ReadError, ReadResult};
use crate::models::{Cell, Table};

/// Hard upper bound on a single input file (1 GiB).
pub const MAX_FILE_BYTES: u64 = 1_073_741_824;

/// Kind of tabular content, chosen from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
}

impl FileKind {
    /// `.csv` files are CSV; anything else is handed to the Excel reader.
    pub fn from_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".csv") {
            FileKind::Csv
        } else {
            FileKind::Excel
        }
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the specified encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        // WINDOWS_1252 is the WHATWG superset of latin-1
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Separators inside double-quoted fields are not counted. Defaults to `,`
/// when no candidate appears; ties go to the earlier candidate.
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b',', b';', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = count_unquoted(first_line, sep);
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn count_unquoted(line: &str, sep: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            // A doubled quote toggles twice and stays inside
            in_quotes = !in_quotes;
        } else if b == sep && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Admission check on a file's byte size. Runs before anything is parsed.
pub fn check_size(name: &str, size: u64, limit: u64) -> ReadResult<()> {
    if size > limit {
        return Err(ReadError::FileTooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Decode one in-memory file into a table.
pub fn load_table(name: &str, bytes: &[u8], limit: u64) -> ReadResult<Table> {
    check_size(name, bytes.len() as u64, limit)?;

    match FileKind::from_name(name) {
        FileKind::Csv => parse_csv_bytes(name, bytes),
        FileKind::Excel => parse_excel_bytes(name, bytes),
    }
}

/// Decode a file on disk. Oversized files are rejected from metadata alone.
pub fn load_table_file(path: &Path, limit: u64) -> ReadResult<Table> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let meta = std::fs::metadata(path).map_err(|e| ReadError::unreadable(&name, e))?;
    check_size(&name, meta.len(), limit)?;

    let bytes = std::fs::read(path).map_err(|e| ReadError::unreadable(&name, e))?;
    load_table(&name, &bytes, limit)
}

/// Parse CSV bytes with auto-detected encoding and delimiter.
pub fn parse_csv_bytes(name: &str, bytes: &[u8]) -> ReadResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_csv_str(name, &content, delimiter)
}

/// Parse CSV text with an explicit delimiter. The first record is the header.
pub fn parse_csv_str(name: &str, content: &str, delimiter: u8) -> ReadResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let headers: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| ReadError::unreadable(name, e))?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => return Err(ReadError::unreadable(name, "No columns to parse from file")),
    };

    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        let record = record.map_err(|e| ReadError::unreadable(name, e))?;
        if record.len() > headers.len() {
            return Err(ReadError::unreadable(
                name,
                format!(
                    "Line {}: expected {} fields, saw {}",
                    idx + 2,
                    headers.len(),
                    record.len()
                ),
            ));
        }
        let mut row: Vec<Cell> = record.iter().map(Cell::from_field).collect();
        row.resize(headers.len(), Cell::Missing);
        rows.push(row);
    }

    Table::from_rows(headers, rows).map_err(|e| ReadError::unreadable(name, e))
}

/// Parse the first sheet of an Excel workbook (xlsx, xls, xlsb, ods).
pub fn parse_excel_bytes(name: &str, bytes: &[u8]) -> ReadResult<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ReadError::unreadable(name, format!("Failed to open Excel file: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReadError::unreadable(name, "Excel file contains no sheets"))?
        .map_err(|e| ReadError::unreadable(name, format!("Failed to read first sheet: {}", e)))?;

    let mut sheet_rows = range.rows();

    let headers: Vec<String> = match sheet_rows.next() {
        Some(row) => row.iter().map(|d| excel_cell(d).to_text()).collect(),
        None => return Err(ReadError::unreadable(name, "No columns to parse from file")),
    };

    let rows: Vec<Vec<Cell>> = sheet_rows
        .filter(|row| row.iter().any(|d| !matches!(d, Data::Empty)))
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();

    Table::from_rows(headers, rows).map_err(|e| ReadError::unreadable(name, e))
}

/// Convert a calamine value to a text cell.
fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Missing,
        Data::String(s) => Cell::from_field(s),
        // Integral floats print without decimals
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Cell::Text(format!("{}", *n as i64))
            } else {
                Cell::Text(format!("{}", n))
            }
        }
        Data::Int(n) => Cell::Text(n.to_string()),
        Data::Bool(b) => Cell::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                Cell::Text(value.format("%Y-%m-%d").to_string())
            }
            Some(value) => Cell::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Text(dt.as_f64().to_string()),
        },
        Data::DateTime(dt) => Cell::Text(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_field(s),
    }
}
