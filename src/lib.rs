//! # chandra-ingest
//!
//! Batch-ingest invoice pages: pull the PDF embedded in each page, send it to
//! a remote OCR service, and save the returned Markdown.
//!
//! Billing portals often deliver invoices as HTML pages with the PDF inlined
//! as a `data:application/pdf;base64,…` URI, sometimes only after JavaScript
//! runs. This crate renders each page in headless Chromium, finds the data
//! URI, writes the PDF to disk and converts it to Markdown through the Chandra
//! OCR endpoint.
//!
//! ## Pipeline Overview
//!
//! ```text
//! spreadsheet (URL column)
//!  │
//!  ├─ 1. Input    read the URL column, skip blank / invalid values
//!  ├─ 2. Extract  render page, locate embed / iframe / script data URI,
//!  │              decode, write <DOWNLOAD_DIR>/<stem>.pdf
//!  ├─ 3. OCR      multipart upload with retry + backoff → Markdown text
//!  └─ 4. Persist  atomic write of <MARKDOWN_DIR>/<stem>.md
//! ```
//!
//! Items run one at a time. A failing item is logged and recorded in the
//! [`BatchReport`]; it never stops the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chandra_ingest::{run_batch, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::builder()
//!         .spreadsheet_path("invoices.xlsx")
//!         .ocr_api_key(std::env::var("CHANDRA_API_KEY")?)
//!         .build()?;
//!     let report = run_batch(&config).await?;
//!     eprintln!("{}/{} converted", report.completed, report.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `chandra-ingest` binary (clap + anyhow + tracing-subscriber + tracing-appender) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! chandra-ingest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
#[cfg(feature = "cli")]
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, BatchRunner};
pub use config::{
    BrowserSettings, IngestConfig, IngestConfigBuilder, OcrSettings, RendererKind, RetryPolicy,
};
pub use error::{IngestError, ItemError, Stage};
pub use output::{BatchReport, DownloadedDocument, ItemOutcome};
pub use pipeline::browser::ChromiumSource;
pub use pipeline::extract::PageDocumentExtractor;
pub use pipeline::ocr::{OcrSubmitter, TextRecognizer};
pub use pipeline::persist::MarkdownPersister;
pub use pipeline::source::{DocumentSource, HttpPageSource};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
