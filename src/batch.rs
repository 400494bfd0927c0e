//! Batch orchestration: drive every URL through extract → OCR → persist.
//!
//! Items are processed strictly one at a time, in input order:
//!
//! ```text
//! Validate ──▶ Extract ──▶ Submit-OCR ──▶ Persist ──▶ Done
//!    │            │             │             │
//!    └──────┬─────┴─────────────┴─────────────┘
//!           ▼
//!    Skipped / Failed   (logged; the batch moves on)
//! ```
//!
//! Each stage returns a `Result` and the orchestrator matches on it, so an
//! item's failure never leaves [`BatchRunner::process_item`]. Panics are
//! caught at two levels: around the OCR call, and around the whole item.
//! Persistence is blocking file I/O and runs on the blocking pool; it is
//! awaited before the next item starts, so no two items ever overlap.

use crate::config::{IngestConfig, RendererKind};
use crate::error::{IngestError, ItemError, Stage};
use crate::output::{BatchReport, ItemOutcome};
use crate::pipeline::browser::ChromiumSource;
use crate::pipeline::extract::PageDocumentExtractor;
use crate::pipeline::input::{read_url_column, validate_url};
use crate::pipeline::ocr::{OcrSubmitter, TextRecognizer};
use crate::pipeline::persist::MarkdownPersister;
use crate::pipeline::source::{DocumentSource, HttpPageSource};
use crate::progress::ProgressCallback;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs work items through the pipeline stages.
pub struct BatchRunner {
    extractor: PageDocumentExtractor,
    recognizer: Arc<dyn TextRecognizer>,
    persister: Arc<MarkdownPersister>,
    progress: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(
        extractor: PageDocumentExtractor,
        recognizer: Arc<dyn TextRecognizer>,
        persister: MarkdownPersister,
    ) -> Self {
        Self {
            extractor,
            recognizer,
            persister: Arc::new(persister),
            progress: None,
        }
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Wire up the production components described by `config`.
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        let source: Arc<dyn DocumentSource> = match config.renderer {
            RendererKind::Chromium => Arc::new(ChromiumSource::new(config.browser.clone())),
            RendererKind::Http => Arc::new(HttpPageSource::new(config.browser.timeout_secs)?),
        };

        if !config.ocr.is_configured() {
            warn!("CHANDRA_API_KEY or CHANDRA_URL is not set; OCR will yield empty markdown");
        }
        let recognizer: Arc<dyn TextRecognizer> = Arc::new(OcrSubmitter::new(config.ocr.clone())?);

        let mut runner = Self::new(
            PageDocumentExtractor::new(source, &config.download_dir),
            recognizer,
            MarkdownPersister::new(&config.markdown_dir),
        );
        runner.progress = config.progress_callback.clone();
        Ok(runner)
    }

    /// Process every value in order. Never fails; see the report for outcomes.
    pub async fn run(&self, values: &[String]) -> BatchReport {
        let start = Instant::now();
        let total = values.len();
        info!("Starting batch of {} items", total);
        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total);
        }

        let mut outcomes = Vec::with_capacity(total);
        for (i, raw) in values.iter().enumerate() {
            let index = i + 1;
            if let Some(ref cb) = self.progress {
                cb.on_item_start(index, total, raw);
            }

            let mut stage = Stage::Validate;
            let attempt = AssertUnwindSafe(self.process_item(index, total, raw, &mut stage))
                .catch_unwind()
                .await;
            let outcome = match attempt {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let e = ItemError::Panicked {
                        stage,
                        detail: panic_message(panic.as_ref()),
                    };
                    error!("Unexpected error processing url {:?}: {}", raw, e);
                    self.failed(index, total, raw.trim(), &e)
                }
            };
            debug!(
                "Item {} finished (completed: {})",
                outcome.index(),
                outcome.is_completed()
            );
            outcomes.push(outcome);
        }

        let report = BatchReport::from_outcomes(outcomes, start.elapsed().as_millis() as u64);
        info!(
            "Batch complete: {}/{} completed ({} with empty markdown), {} skipped, {} failed, {}ms",
            report.completed,
            report.total,
            report.empty_markdown,
            report.skipped,
            report.failed,
            report.duration_ms
        );
        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(report.total, report.completed);
        }
        report
    }

    /// Drive one item to a terminal state. `stage` tracks progress so a
    /// panic caught by the caller can be attributed.
    pub async fn process_item(
        &self,
        index: usize,
        total: usize,
        raw: &str,
        stage: &mut Stage,
    ) -> ItemOutcome {
        // ── Validate ─────────────────────────────────────────────────────
        *stage = Stage::Validate;
        let url = match validate_url(raw) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!("Skipping invalid url value: {}", e);
                let reason = match &e {
                    ItemError::InvalidUrl { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                if let Some(ref cb) = self.progress {
                    cb.on_item_skipped(index, total, &reason);
                }
                return ItemOutcome::Skipped {
                    index,
                    value: raw.to_string(),
                    reason,
                };
            }
        };
        info!("[{}/{}] Processing {}", index, total, url);

        // ── Extract ──────────────────────────────────────────────────────
        *stage = Stage::Extract;
        let document = match self.extractor.extract(&url).await {
            Ok(doc) => doc,
            Err(e) => {
                error!("Failed to download from {}: {}", url, e);
                return self.failed(index, total, &url, &e);
            }
        };

        // ── Submit-OCR ───────────────────────────────────────────────────
        *stage = Stage::Ocr;
        let recognized = AssertUnwindSafe(self.recognizer.recognize(&document.path))
            .catch_unwind()
            .await;
        let markdown = match recognized {
            Ok(markdown) => markdown,
            Err(panic) => {
                let e = ItemError::Panicked {
                    stage: Stage::Ocr,
                    detail: panic_message(panic.as_ref()),
                };
                error!("OCR failed for {}: {}", document.path.display(), e);
                return self.failed(index, total, &url, &e);
            }
        };
        let markdown_len = markdown.len();

        // ── Persist ──────────────────────────────────────────────────────
        *stage = Stage::Persist;
        let persister = Arc::clone(&self.persister);
        let doc_path = document.path.clone();
        let persisted =
            tokio::task::spawn_blocking(move || persister.persist(&doc_path, &markdown)).await;
        let artifact = match persisted {
            Ok(Some(path)) => path,
            Ok(None) => {
                let detail = format!(
                    "markdown for {} was not written (see previous error)",
                    document.path.display()
                );
                if let Some(ref cb) = self.progress {
                    cb.on_item_failed(index, total, Stage::Persist, &detail);
                }
                return ItemOutcome::Failed {
                    index,
                    url,
                    stage: Stage::Persist,
                    error: detail,
                };
            }
            Err(join) => {
                let e = ItemError::Panicked {
                    stage: Stage::Persist,
                    detail: join.to_string(),
                };
                error!("Saving markdown failed for {}: {}", document.path.display(), e);
                return self.failed(index, total, &url, &e);
            }
        };

        if let Some(ref cb) = self.progress {
            cb.on_item_complete(index, total, markdown_len);
        }
        ItemOutcome::Completed {
            index,
            url,
            document: document.path,
            artifact,
            markdown_len,
        }
    }

    fn failed(&self, index: usize, total: usize, url: &str, e: &ItemError) -> ItemOutcome {
        let message = e.to_string();
        if let Some(ref cb) = self.progress {
            cb.on_item_failed(index, total, e.stage(), &message);
        }
        ItemOutcome::Failed {
            index,
            url: url.to_string(),
            stage: e.stage(),
            error: message,
        }
    }
}

/// Run a whole batch as described by `config`.
///
/// # Errors
/// Only setup failures are returned: output directories not creatable,
/// spreadsheet missing or unreadable, URL column absent, HTTP client not
/// constructible. Item failures are reported in the [`BatchReport`].
pub async fn run_batch(config: &IngestConfig) -> Result<BatchReport, IngestError> {
    for dir in [&config.download_dir, &config.markdown_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| IngestError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
    }

    let urls = read_urls(&config.spreadsheet_path, &config.url_column).await?;
    let runner = BatchRunner::from_config(config)?;
    Ok(runner.run(&urls).await)
}

/// Spreadsheet parsing is blocking; keep it off the runtime threads.
async fn read_urls(path: &Path, column: &str) -> Result<Vec<String>, IngestError> {
    let path_buf = path.to_path_buf();
    let column = column.to_string();
    tokio::task::spawn_blocking(move || read_url_column(&path_buf, &column))
        .await
        .map_err(|e| IngestError::SpreadsheetRead {
            path: path.to_path_buf(),
            detail: format!("reader task panicked: {e}"),
        })?
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
