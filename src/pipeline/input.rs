//! Input resolution: read the URL column from a spreadsheet and validate
//! individual cell values.
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read with
//! calamine; `.csv` with the csv crate. Only the first worksheet is used and
//! its first row is the header. Truly empty cells are dropped here; anything
//! else (including whitespace-only values or numbers) is passed through so the
//! orchestrator can skip it with a warning.

use crate::error::{IngestError, ItemError};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

/// Validate one cell value as a work item URL.
///
/// Returns the trimmed URL. `http`, `https` and `file` schemes are accepted.
pub fn validate_url(raw: &str) -> Result<&str, ItemError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ItemError::InvalidUrl {
            value: raw.to_string(),
            reason: "blank value".into(),
        });
    }

    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => Ok(value),
        Ok(url) => Err(ItemError::InvalidUrl {
            value: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(ItemError::InvalidUrl {
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Read every non-empty value of `column`, in row order.
pub fn read_url_column(path: &Path, column: &str) -> Result<Vec<String>, IngestError> {
    if !path.exists() {
        return Err(IngestError::SpreadsheetNotFound {
            path: path.to_path_buf(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let values = match ext.as_str() {
        "csv" => read_csv_column(path, column)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_column(path, column)?,
        _ => {
            return Err(IngestError::UnsupportedSpreadsheet {
                path: path.to_path_buf(),
                extension: ext,
            })
        }
    };

    info!(
        "Read {} values from column '{}' of {}",
        values.len(),
        column,
        path.display()
    );
    Ok(values)
}

fn find_column(headers: &[String], column: &str) -> Result<usize, IngestError> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| IngestError::MissingColumn {
            column: column.to_string(),
            available: headers.to_vec(),
        })
}

fn read_csv_column(path: &Path, column: &str) -> Result<Vec<String>, IngestError> {
    let read_err = |e: csv::Error| IngestError::SpreadsheetRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .map_err(read_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(read_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::EmptySpreadsheet {
            path: path.to_path_buf(),
        });
    }
    let idx = find_column(&headers, column)?;

    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(read_err)?;
        match record.get(idx) {
            Some(cell) if !cell.is_empty() => values.push(cell.to_string()),
            // +2: 1-based, after the header row
            _ => debug!("Dropping empty cell in row {}", row + 2),
        }
    }
    Ok(values)
}

fn read_workbook_column(path: &Path, column: &str) -> Result<Vec<String>, IngestError> {
    let read_err = |detail: String| IngestError::SpreadsheetRead {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| read_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::EmptySpreadsheet {
            path: path.to_path_buf(),
        })?
        .map_err(|e| read_err(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| IngestError::EmptySpreadsheet {
            path: path.to_path_buf(),
        })?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    let idx = find_column(&headers, column)?;

    Ok(rows
        .filter_map(|row| match row.get(idx) {
            None | Some(Data::Empty) => None,
            Some(Data::String(s)) if s.is_empty() => None,
            Some(Data::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .collect())
}
