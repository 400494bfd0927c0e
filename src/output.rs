//! Values produced by the pipeline: the saved PDF, the per-item outcome, and
//! the batch report.

use crate::error::Stage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A PDF extracted from a page and written under the download directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedDocument {
    /// The page the PDF was found on.
    pub url: String,
    /// Where the decoded bytes were written.
    pub path: PathBuf,
    pub bytes_written: usize,
}

/// Terminal state of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// All stages ran; `artifact` exists on disk.
    Completed {
        index: usize,
        url: String,
        document: PathBuf,
        artifact: PathBuf,
        /// Byte length of the persisted markdown (0 = OCR produced no text).
        markdown_len: usize,
    },
    /// The cell value was not a usable URL.
    Skipped {
        index: usize,
        value: String,
        reason: String,
    },
    /// A stage failed; later stages did not run.
    Failed {
        index: usize,
        url: String,
        stage: Stage,
        error: String,
    },
}

impl ItemOutcome {
    /// 1-indexed position of the item in the input list.
    pub fn index(&self) -> usize {
        match self {
            ItemOutcome::Completed { index, .. }
            | ItemOutcome::Skipped { index, .. }
            | ItemOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ItemOutcome::Completed { .. })
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub completed: usize,
    /// Completed items whose markdown was empty.
    pub empty_markdown: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Build a report from outcomes, deriving the counters.
    pub fn from_outcomes(items: Vec<ItemOutcome>, duration_ms: u64) -> Self {
        let mut report = BatchReport {
            total: items.len(),
            duration_ms,
            ..Default::default()
        };
        for item in &items {
            match item {
                ItemOutcome::Completed { markdown_len, .. } => {
                    report.completed += 1;
                    if *markdown_len == 0 {
                        report.empty_markdown += 1;
                    }
                }
                ItemOutcome::Skipped { .. } => report.skipped += 1,
                ItemOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.items = items;
        report
    }

    /// Outcomes that failed at `stage`.
    pub fn failures_at(&self, stage: Stage) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(move |o| {
            matches!(o, ItemOutcome::Failed { stage: s, .. } if *s == stage)
        })
    }
}
