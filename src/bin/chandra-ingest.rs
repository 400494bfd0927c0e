//! CLI binary for chandra-ingest.
//!
//! A thin shim over the library crate: loads `.env`, maps flags and
//! environment variables to `IngestConfig`, installs logging, runs the batch
//! and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use chandra_ingest::config::{DEFAULT_OCR_URL, DEFAULT_URL_COLUMN};
use chandra_ingest::logging;
use chandra_ingest::{
    run_batch, BatchProgressCallback, BatchReport, IngestConfig, ProgressCallback, RendererKind,
    Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::error;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished item.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the item in flight.
    started: Mutex<Option<Instant>>,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading spreadsheet…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            failures: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} items  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Ingesting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total} invoice links…"))
        ));
    }

    fn on_item_start(&self, index: usize, _total: usize, value: &str) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("#{index} {}", value.trim()));
    }

    fn on_item_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let size = if markdown_len == 0 {
            yellow("   empty")
        } else {
            dim(&format!("{markdown_len:>5} chars"))
        };
        self.bar.println(format!(
            "  {} Item {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            size,
            self.elapsed()
        ));
        self.bar.inc(1);
    }

    fn on_item_skipped(&self, index: usize, total: usize, reason: &str) {
        self.bar.println(format!(
            "  {} Item {:>3}/{:<3}  {}",
            yellow("–"),
            index,
            total,
            dim(&format!("skipped: {reason}"))
        ));
        if let Ok(mut started) = self.started.lock() {
            started.take();
        }
        self.bar.inc(1);
    }

    fn on_item_failed(&self, index: usize, total: usize, stage: Stage, error: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Item {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&format!("[{stage}] {msg}")),
            self.elapsed()
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, completed: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        let mark = if failed == 0 {
            green("✔")
        } else if completed == 0 {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{} {}/{} items converted  ({} failed)",
            mark,
            bold(&completed.to_string()),
            total,
            failed
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Defaults: demo.xlsx → downloads/ + markdown_output/
  chandra-ingest

  # Another spreadsheet and column
  chandra-ingest --excel-path invoices.csv --url-column "Invoice URL"

  # Pages that don't need JavaScript
  chandra-ingest --renderer http

  # Machine-readable report
  chandra-ingest --json > report.json

ENVIRONMENT VARIABLES (a .env file in the working directory is loaded first):
  CHANDRA_API_KEY       OCR bearer token (required for non-empty output)
  CHANDRA_URL           OCR endpoint
  EXCEL_PATH            Input spreadsheet (.xlsx/.xls/.ods/.csv)
  URL_COLUMN            Column holding the invoice links
  DOWNLOAD_DIR          Where extracted PDFs are written
  MARKDOWN_DIR          Where Markdown files are written
  LOG_DIR / LOG_LEVEL   Rolling log files and verbosity
  PAGE_RENDERER         chromium (default) or http
  CHROME_PATH           Chrome/Chromium binary to launch
"#;

/// Extract embedded invoice PDFs and convert them to Markdown via OCR.
#[derive(Parser, Debug)]
#[command(
    name = "chandra-ingest",
    version,
    about = "Extract embedded invoice PDFs from web pages and convert them to Markdown via OCR",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Spreadsheet with the URL column.
    #[arg(long, env = "EXCEL_PATH", default_value = "demo.xlsx")]
    excel_path: PathBuf,

    /// Header of the column holding invoice links.
    #[arg(long, env = "URL_COLUMN", default_value = DEFAULT_URL_COLUMN)]
    url_column: String,

    /// Directory for extracted PDFs.
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "downloads")]
    download_dir: PathBuf,

    /// Directory for Markdown output.
    #[arg(long, env = "MARKDOWN_DIR", default_value = "markdown_output")]
    markdown_dir: PathBuf,

    /// OCR API key.
    #[arg(long, env = "CHANDRA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR endpoint URL.
    #[arg(long, env = "CHANDRA_URL", default_value = DEFAULT_OCR_URL)]
    ocr_url: String,

    /// Per-request OCR timeout in seconds.
    #[arg(long, env = "OCR_TIMEOUT_SECS", default_value_t = 30)]
    ocr_timeout: u64,

    /// Retries for OCR on 5xx and connection errors.
    #[arg(long, env = "OCR_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Exponential backoff factor in seconds.
    #[arg(long, env = "OCR_BACKOFF_FACTOR", default_value_t = 0.3)]
    backoff_factor: f64,

    /// How pages are loaded: chromium (runs scripts) or http (raw markup).
    #[arg(long, env = "PAGE_RENDERER", value_enum, default_value = "chromium")]
    renderer: RendererArg,

    /// Upper bound for one page render in seconds.
    #[arg(long, env = "BROWSER_TIMEOUT_SECS", default_value_t = 60)]
    browser_timeout: u64,

    /// Chrome/Chromium executable.
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Launch Chromium with --no-sandbox.
    #[arg(long, env = "BROWSER_NO_SANDBOX")]
    no_sandbox: bool,

    /// Directory for rolling log files.
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Log level (DEBUG, INFO, WARNING, ERROR).
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,

    /// Print the batch report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CHANDRA_NO_PROGRESS")]
    no_progress: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RendererArg {
    Chromium,
    Http,
}

impl From<RendererArg> for RendererKind {
    fn from(v: RendererArg) -> Self {
        match v {
            RendererArg::Chromium => RendererKind::Chromium,
            RendererArg::Http => RendererKind::Http,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so .env values feed clap's `env` fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    // No subscriber yet, so this one goes straight to stderr. Exit status stays 0.
    let _guard = match logging::init(&cli.log_dir, &cli.log_level, cli.quiet || show_progress) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e}");
            return Ok(());
        }
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    // Setup failures are logged, not propagated: the exit status stays 0.
    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return Ok(());
        }
    };

    let report = match run_batch(&config).await {
        Ok(report) => report,
        Err(e) => {
            error!("Batch aborted: {}", e);
            return Ok(());
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &cli);
    }

    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let mut builder = IngestConfig::builder()
        .spreadsheet_path(&cli.excel_path)
        .url_column(&cli.url_column)
        .download_dir(&cli.download_dir)
        .markdown_dir(&cli.markdown_dir)
        .ocr_endpoint(&cli.ocr_url)
        .ocr_timeout_secs(cli.ocr_timeout)
        .max_retries(cli.max_retries)
        .backoff_factor(cli.backoff_factor)
        .renderer(cli.renderer.into())
        .browser_timeout_secs(cli.browser_timeout)
        .no_sandbox(cli.no_sandbox);

    if let Some(ref key) = cli.api_key {
        builder = builder.ocr_api_key(key);
    }
    if let Some(ref path) = cli.chrome_path {
        builder = builder.chrome_executable(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &BatchReport, cli: &Cli) {
    eprintln!(
        "{}  {}/{} completed  {} skipped  {} failed  {}ms",
        if report.failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.completed,
        report.total,
        report.skipped,
        report.failed,
        report.duration_ms,
    );
    if report.empty_markdown > 0 {
        eprintln!(
            "   {} items produced empty markdown (check CHANDRA_API_KEY / OCR logs)",
            yellow(&report.empty_markdown.to_string())
        );
    }
    eprintln!(
        "   PDFs → {}   Markdown → {}",
        bold(&cli.download_dir.display().to_string()),
        bold(&cli.markdown_dir.display().to_string()),
    );
}
