//! Pipeline stages for one work item.
//!
//! Each submodule implements exactly one step, independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ ocr ──▶ persist
//! (URL)     (PDF file)  (text)  (.md file)
//! ```
//!
//! 1. [`input`]  : read the URL column, validate a cell value
//! 2. [`extract`]: load the page through a [`source::DocumentSource`]
//!    ([`browser`] or plain HTTP), find the PDF data URI ([`locate`]), save it
//! 3. [`ocr`]    : multipart upload through the retrying [`http`] client
//! 4. [`persist`]: temp-file-then-rename write of the Markdown; blocking,
//!    so the orchestrator runs it in `spawn_blocking`

pub mod browser;
pub mod extract;
pub mod http;
pub mod input;
pub mod locate;
pub mod ocr;
pub mod persist;
pub mod source;
