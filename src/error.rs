//! Error types for the chandra-ingest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] is **fatal**: the run cannot start at all (spreadsheet
//!   missing, required column absent, output directory not creatable).
//!   Returned as `Err(IngestError)` from [`crate::batch::run_batch`] before
//!   any item is touched.
//!
//! * [`ItemError`] is **non-fatal**: a single URL failed at one pipeline stage
//!   (navigation error, no embedded PDF, OCR rejected the upload). Recorded in
//!   [`crate::output::ItemOutcome`] and logged; the batch moves on to the
//!   next item.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the chandra-ingest library.
///
/// Item-level failures use [`ItemError`] and never cross an item boundary.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The configured spreadsheet does not exist.
    #[error("Spreadsheet not found: '{path}'\nSet EXCEL_PATH or pass --excel-path.")]
    SpreadsheetNotFound { path: PathBuf },

    /// The spreadsheet exists but could not be opened or parsed.
    #[error("Failed to read spreadsheet '{path}': {detail}")]
    SpreadsheetRead { path: PathBuf, detail: String },

    /// The file extension is not a known spreadsheet format.
    #[error("Unsupported spreadsheet type '.{extension}' for '{path}'. Supported: .xlsx, .xlsm, .xls, .xlsb, .ods, .csv")]
    UnsupportedSpreadsheet { path: PathBuf, extension: String },

    /// The spreadsheet has no header row to look the URL column up in.
    #[error("Spreadsheet '{path}' has no header row")]
    EmptySpreadsheet { path: PathBuf },

    /// The required URL column is absent from the header row.
    #[error("Expected column '{column}' not found. Columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// An output directory could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP client could not be constructed (TLS backend init etc.).
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Pipeline stage an item was in when it left the happy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Extract,
    Ocr,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Ocr => "ocr",
            Stage::Persist => "persist",
        })
    }
}

/// A non-fatal error for a single work item.
///
/// The orchestrator matches on these to decide continue-vs-abandon; none of
/// them ever aborts the batch.
#[derive(Debug, Error)]
pub enum ItemError {
    // ── Validate ──────────────────────────────────────────────────────────
    /// The cell value is blank or not an http(s)/file URL.
    #[error("Invalid url value {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    // ── Extract ───────────────────────────────────────────────────────────
    /// The headless browser could not be started.
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    /// The page could not be loaded or its DOM could not be read.
    #[error("Failed to load '{url}': {detail}")]
    Navigation { url: String, detail: String },

    /// Loading and capturing the page exceeded the browser timeout.
    #[error("Loading '{url}' timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    /// No `embed`, `iframe` or script on the page carries a PDF data URI.
    #[error("No embedded data: PDF found on page '{url}'")]
    NoEmbeddedDocument { url: String },

    /// A data URI was found but its payload could not be decoded.
    #[error("Embedded PDF payload is invalid: {detail}")]
    InvalidPayload { detail: String },

    /// The decoded PDF could not be written to the download directory.
    #[error("Failed to write PDF '{path}': {source}")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── OCR ───────────────────────────────────────────────────────────────
    /// API key or endpoint missing; no request was attempted.
    #[error("Missing CHANDRA_API_KEY or CHANDRA_URL. Set environment/config correctly.")]
    OcrNotConfigured,

    /// The PDF handed to the OCR stage does not exist.
    #[error("PDF not found: '{path}'")]
    DocumentMissing { path: PathBuf },

    /// Transport-level failure (connect, timeout, body read).
    #[error("OCR request failed for '{file}': {detail}")]
    OcrRequest { file: String, detail: String },

    /// The OCR endpoint answered with a non-success status.
    #[error("OCR endpoint returned HTTP {status} for '{file}': {body}")]
    OcrStatus {
        file: String,
        status: u16,
        body: String,
    },

    /// The OCR response body was not JSON.
    #[error("Invalid JSON response from OCR for '{file}': {detail}")]
    OcrInvalidJson { file: String, detail: String },

    // ── Persist ───────────────────────────────────────────────────────────
    /// Directory creation, temp write or rename failed.
    #[error("Failed saving markdown '{path}': {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A stage panicked; caught at the item boundary.
    #[error("Unexpected error during {stage}: {detail}")]
    Panicked { stage: Stage, detail: String },
}

impl ItemError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ItemError::InvalidUrl { .. } => Stage::Validate,
            ItemError::BrowserLaunch(_)
            | ItemError::Navigation { .. }
            | ItemError::NavigationTimeout { .. }
            | ItemError::NoEmbeddedDocument { .. }
            | ItemError::InvalidPayload { .. }
            | ItemError::DocumentWrite { .. } => Stage::Extract,
            ItemError::OcrNotConfigured
            | ItemError::DocumentMissing { .. }
            | ItemError::OcrRequest { .. }
            | ItemError::OcrStatus { .. }
            | ItemError::OcrInvalidJson { .. } => Stage::Ocr,
            ItemError::PersistFailed { .. } => Stage::Persist,
            ItemError::Panicked { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_lists_available() {
        let e = IngestError::MissingColumn {
            column: "Final Invoice Link".into(),
            available: vec!["Name".into(), "Amount".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("Final Invoice Link"), "got: {msg}");
        assert!(msg.contains("Amount"), "got: {msg}");
    }

    #[test]
    fn not_found_display() {
        let e = ItemError::NoEmbeddedDocument {
            url: "http://a.test/x.html".into(),
        };
        assert!(e.to_string().contains("http://a.test/x.html"));
        assert_eq!(e.stage(), Stage::Extract);
    }

    #[test]
    fn ocr_status_display() {
        let e = ItemError::OcrStatus {
            file: "inv1.pdf".into(),
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(e.to_string().contains("502"));
        assert_eq!(e.stage(), Stage::Ocr);
    }

    #[test]
    fn panicked_keeps_stage() {
        let e = ItemError::Panicked {
            stage: Stage::Persist,
            detail: "boom".into(),
        };
        assert_eq!(e.stage(), Stage::Persist);
        assert!(e.to_string().contains("persist"));
    }

    #[test]
    fn stage_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Ocr).unwrap(), "\"ocr\"");
    }
}
