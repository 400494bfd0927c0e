//! Markdown persistence with atomic replace.
//!
//! Content is written to a temporary sibling of the target, flushed to disk,
//! and renamed over the target. Readers of the output directory therefore see
//! either the previous artifact or the complete new one, never a truncated
//! file. A temp file that is never committed (crash, error, early return) is
//! removed when its [`StagedArtifact`] is dropped.
//!
//! These are blocking `std::fs` operations; the orchestrator runs them on
//! the blocking pool.

use crate::error::ItemError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info};

pub struct MarkdownPersister {
    dir: PathBuf,
}

/// Markdown written to a temp file, not yet visible at its target path.
#[derive(Debug)]
pub struct StagedArtifact {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedArtifact {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically move the staged content to its target path.
    pub fn commit(self) -> Result<PathBuf, ItemError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| ItemError::PersistFailed {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(target)
    }
}

impl MarkdownPersister {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<document stem>.md`.
    pub fn target_for(&self, document: &Path) -> PathBuf {
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.dir.join(format!("{stem}.md"))
    }

    /// Write `markdown` to a temp file next to the target.
    pub fn stage(&self, document: &Path, markdown: &str) -> Result<StagedArtifact, ItemError> {
        let target = self.target_for(document);
        let fail = |source: std::io::Error| ItemError::PersistFailed {
            path: target.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(fail)?;

        let prefix = format!(
            ".{}.",
            target
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".md.tmp")
            .tempfile_in(&self.dir)
            .map_err(fail)?;

        temp.write_all(markdown.as_bytes()).map_err(fail)?;
        temp.flush().map_err(fail)?;
        temp.as_file().sync_all().map_err(fail)?;

        Ok(StagedArtifact { temp, target })
    }

    /// Stage and commit in one go.
    pub fn try_persist(&self, document: &Path, markdown: &str) -> Result<PathBuf, ItemError> {
        self.stage(document, markdown)?.commit()
    }

    /// Persist, absorbing failures: they are logged and `None` is returned.
    pub fn persist(&self, document: &Path, markdown: &str) -> Option<PathBuf> {
        match self.try_persist(document, markdown) {
            Ok(path) => {
                info!("Saved markdown: {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }
}
