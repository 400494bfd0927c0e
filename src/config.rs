//! Configuration types for a batch ingestion run.
//!
//! All run behaviour is controlled through [`IngestConfig`], built via its
//! [`IngestConfigBuilder`]. Components never read the environment themselves;
//! each takes its slice of this struct in its constructor so tests can
//! substitute values freely. The CLI is the only place environment variables
//! are consulted.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default OCR endpoint.
pub const DEFAULT_OCR_URL: &str = "https://api.chandra.run/v1/ocr";

/// Spreadsheet column holding the invoice URLs.
pub const DEFAULT_URL_COLUMN: &str = "Final Invoice Link";

/// Configuration for a batch run.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use chandra_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .spreadsheet_path("invoices.xlsx")
///     .ocr_api_key("secret")
///     .build()
///     .unwrap();
/// assert_eq!(config.url_column, "Final Invoice Link");
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Where extracted PDFs are written. Default: `downloads`.
    pub download_dir: PathBuf,

    /// Where Markdown artifacts are written. Default: `markdown_output`.
    pub markdown_dir: PathBuf,

    /// Input spreadsheet. Default: `demo.xlsx`.
    pub spreadsheet_path: PathBuf,

    /// Header of the column holding the URLs. Default: `Final Invoice Link`.
    pub url_column: String,

    /// OCR endpoint, credentials and retry behaviour.
    pub ocr: OcrSettings,

    /// How pages are loaded before the PDF payload is searched for.
    pub renderer: RendererKind,

    /// Headless browser knobs (only used with [`RendererKind::Chromium`]).
    pub browser: BrowserSettings,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            markdown_dir: PathBuf::from("markdown_output"),
            spreadsheet_path: PathBuf::from("demo.xlsx"),
            url_column: DEFAULT_URL_COLUMN.to_string(),
            ocr: OcrSettings::default(),
            renderer: RendererKind::default(),
            browser: BrowserSettings::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("download_dir", &self.download_dir)
            .field("markdown_dir", &self.markdown_dir)
            .field("spreadsheet_path", &self.spreadsheet_path)
            .field("url_column", &self.url_column)
            .field("ocr", &self.ocr)
            .field("renderer", &self.renderer)
            .field("browser", &self.browser)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// OCR endpoint settings.
#[derive(Clone)]
pub struct OcrSettings {
    /// Bearer token. Required; there is no default.
    pub api_key: Option<String>,

    /// Multipart upload endpoint. Default: [`DEFAULT_OCR_URL`].
    pub endpoint: String,

    /// Per-request timeout in seconds. Default: 30.
    pub timeout_secs: u64,

    /// Retry behaviour for transient server errors.
    pub retry: RetryPolicy,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_OCR_URL.to_string(),
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for OcrSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OcrSettings {
    /// True when both the key and the endpoint are non-empty.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
            && !self.endpoint.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry behaviour for the OCR HTTP client.
///
/// Mirrors the classic "retry adapter" knobs: a total attempt budget, an
/// exponential backoff factor, and the statuses and methods eligible for a
/// retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 2.
    pub total: u32,

    /// Backoff factor in seconds. Default: 0.3.
    ///
    /// The first retry is immediate; the sleep before retry `n >= 2` is
    /// `backoff_factor * 2^(n-1)`. With the defaults that is 0 s → 0.6 s.
    pub backoff_factor: f64,

    /// Response statuses that trigger a retry. Default: 500, 502, 503, 504.
    pub status_forcelist: Vec<u16>,

    /// Methods that may be retried. Default: GET, POST.
    pub allowed_methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total: 2,
            backoff_factor: 0.3,
            status_forcelist: vec![500, 502, 503, 504],
            allowed_methods: vec![Method::GET, Method::POST],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            total: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based). Zero for the first retry.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        if retry <= 1 || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let secs = self.backoff_factor * 2f64.powi(retry as i32 - 1);
        Duration::from_secs_f64(secs)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }
}

/// How a page is loaded before the embedded-PDF search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Headless Chromium; scripts run before the DOM is inspected. (default)
    #[default]
    Chromium,
    /// Plain HTTP GET of the raw markup. No script execution.
    Http,
}

/// Headless browser settings.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Upper bound for launch + navigation + DOM capture, in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Explicit Chrome/Chromium binary. Auto-detected when `None`.
    pub chrome_executable: Option<PathBuf>,

    /// Pass `--no-sandbox` (needed when running as root in containers).
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            chrome_executable: None,
            no_sandbox: false,
        }
    }
}

impl BrowserSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    pub fn markdown_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.markdown_dir = dir.into();
        self
    }

    pub fn spreadsheet_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.spreadsheet_path = path.into();
        self
    }

    pub fn url_column(mut self, column: impl Into<String>) -> Self {
        self.config.url_column = column.into();
        self
    }

    pub fn ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ocr.api_key = Some(key.into());
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr.endpoint = url.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr.timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.ocr.retry.total = n;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.ocr.retry.backoff_factor = factor;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.ocr.retry = policy;
        self
    }

    pub fn renderer(mut self, kind: RendererKind) -> Self {
        self.config.renderer = kind;
        self
    }

    pub fn browser_timeout_secs(mut self, secs: u64) -> Self {
        self.config.browser.timeout_secs = secs;
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser.chrome_executable = Some(path.into());
        self
    }

    pub fn no_sandbox(mut self, v: bool) -> Self {
        self.config.browser.no_sandbox = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing API key is *not* a build error: the OCR stage reports it per
    /// item so extraction still runs.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.url_column.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "URL column name must not be empty".into(),
            ));
        }
        if !c.ocr.retry.backoff_factor.is_finite() || c.ocr.retry.backoff_factor < 0.0 {
            return Err(IngestError::InvalidConfig(format!(
                "Backoff factor must be a non-negative number, got {}",
                c.ocr.retry.backoff_factor
            )));
        }
        if c.ocr.timeout_secs == 0 {
            return Err(IngestError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if c.browser.timeout_secs == 0 {
            return Err(IngestError::InvalidConfig(
                "Browser timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
