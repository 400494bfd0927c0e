//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events as the orchestrator walks the URL list. The CLI uses it to drive a
//! terminal progress bar; library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use chandra_ingest::{BatchProgressCallback, IngestConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, index: usize, total: usize, _markdown_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("item {index}/{total} done ({n} so far)");
//!     }
//! }
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the orchestrator as it processes each work item.
///
/// Items are processed one at a time, so calls never overlap, but the trait
/// is `Send + Sync` because the orchestrator runs on a multi-threaded
/// runtime. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after the URL list was read.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before an item is validated.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the URL list
    /// * `total`: number of items in the batch
    /// * `value`: raw cell value
    fn on_item_start(&self, index: usize, total: usize, value: &str) {
        let _ = (index, total, value);
    }

    /// Called when an item reached the Done state.
    ///
    /// `markdown_len` is the byte length of the persisted markdown (0 when the
    /// OCR stage produced no text).
    fn on_item_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let _ = (index, total, markdown_len);
    }

    /// Called when an item was skipped during validation.
    fn on_item_skipped(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called when an item failed at `stage`.
    fn on_item_failed(&self, index: usize, total: usize, stage: Stage, error: &str) {
        let _ = (index, total, stage, error);
    }

    /// Called once after every item was attempted.
    fn on_batch_complete(&self, total: usize, completed: usize) {
        let _ = (total, completed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
