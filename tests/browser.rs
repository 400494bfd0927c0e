//! Headless Chromium tests.
//!
//! These launch a real browser, so they are gated behind `E2E_ENABLED`.
//! Set `CHROME_PATH` if Chromium is not on the default search path and
//! `BROWSER_NO_SANDBOX=1` when running as root in a container.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test browser -- --nocapture

mod common;

use chandra_ingest::{
    BrowserSettings, ChromiumSource, DocumentSource, ItemError, PageDocumentExtractor,
};
use common::{spawn_stub, PDF_BYTES};
use std::path::PathBuf;
use std::sync::Arc;

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run browser tests");
            return;
        }
    }};
}

fn settings(timeout_secs: u64) -> BrowserSettings {
    BrowserSettings {
        timeout_secs,
        chrome_executable: std::env::var_os("CHROME_PATH").map(PathBuf::from),
        no_sandbox: std::env::var("BROWSER_NO_SANDBOX").is_ok(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn renders_embed_page_and_extracts_pdf() {
    e2e_skip_unless_enabled!();
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();

    let extractor =
        PageDocumentExtractor::new(Arc::new(ChromiumSource::new(settings(60))), dir.path());
    let doc = extractor.extract(&stub.url("/inv1.html")).await.unwrap();

    assert_eq!(doc.path, dir.path().join("inv1.pdf"));
    assert_eq!(std::fs::read(&doc.path).unwrap(), PDF_BYTES);
}

#[tokio::test(flavor = "multi_thread")]
async fn script_payload_is_found_after_rendering() {
    e2e_skip_unless_enabled!();
    let stub = spawn_stub().await;
    let source = ChromiumSource::new(settings(60));

    let bytes = source
        .fetch_embedded(&stub.url("/scripted.html"))
        .await
        .unwrap();
    assert_eq!(bytes.as_deref(), Some(PDF_BYTES));
}

#[tokio::test(flavor = "multi_thread")]
async fn page_without_pdf_is_none() {
    e2e_skip_unless_enabled!();
    let stub = spawn_stub().await;
    let source = ChromiumSource::new(settings(60));

    assert_eq!(
        source.fetch_embedded(&stub.url("/plain.html")).await.unwrap(),
        None
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_is_a_navigation_failure() {
    e2e_skip_unless_enabled!();
    let source = ChromiumSource::new(settings(30));

    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let result = source
        .fetch_embedded(&format!("http://127.0.0.1:{port}/inv.html"))
        .await;
    assert!(matches!(
        result,
        Err(ItemError::Navigation { .. }) | Err(ItemError::NavigationTimeout { .. })
    ));
}
