//! Console + rolling-file tracing setup for the binary.
//!
//! Two layers share one registry: a stderr fmt layer and a daily-rotated file
//! under `LOG_DIR` (`chandra_ingest.<date>.log`, seven files kept). The file
//! is written through a non-blocking worker; keep the returned guard alive
//! until the process ends or buffered lines are lost.

use crate::error::IngestError;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const LOG_FILE_PREFIX: &str = "chandra_ingest";
pub const MAX_LOG_FILES: usize = 7;

/// Map a `LOG_LEVEL` value to an `EnvFilter` directive.
///
/// Accepts the usual level names in any case, plus `WARNING` and `CRITICAL`
/// as aliases for `warn` and `error`. Anything else is passed through so
/// full directives (`chandra_ingest=debug,reqwest=info`) still work.
pub fn level_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "" => "info".to_string(),
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

fn filter_for(directive: &str) -> EnvFilter {
    // RUST_LOG wins when set.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Build the rotating file appender, creating `log_dir` first.
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, IngestError> {
    std::fs::create_dir_all(log_dir).map_err(|e| IngestError::CreateDir {
        path: log_dir.to_path_buf(),
        source: e,
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .map_err(|e| IngestError::InvalidConfig(format!("cannot open log file: {e}")))
}

/// Install the global subscriber.
///
/// `console_errors_only` narrows the stderr layer to `error` (used while a
/// progress bar owns the terminal); the file layer always logs at `level`.
pub fn init(
    log_dir: &Path,
    level: &str,
    console_errors_only: bool,
) -> Result<WorkerGuard, IngestError> {
    let directive = level_directive(level);
    let (writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    let console_filter = if console_errors_only {
        EnvFilter::new("error")
    } else {
        filter_for(&directive)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter_for(&directive)),
        )
        .try_init()
        .map_err(|e| IngestError::InvalidConfig(format!("logging already initialised: {e}")))?;

    Ok(guard)
}
