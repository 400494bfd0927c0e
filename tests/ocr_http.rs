//! OCR submission against an in-process stub endpoint.
//!
//! Run with:
//!   cargo test --test ocr_http

mod common;

use chandra_ingest::{ItemError, OcrSettings, OcrSubmitter, RetryPolicy, TextRecognizer};
use common::{fast_retry, spawn_stub, StubState, API_KEY, PDF_BYTES};
use std::path::PathBuf;

fn submitter(endpoint: String, retry: RetryPolicy) -> OcrSubmitter {
    OcrSubmitter::new(OcrSettings {
        api_key: Some(API_KEY.to_string()),
        endpoint,
        timeout_secs: 5,
        retry,
    })
    .unwrap()
}

fn write_pdf(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, PDF_BYTES).unwrap();
    path
}

#[tokio::test]
async fn uploads_pdf_as_multipart_with_bearer_token() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "inv1.pdf");

    let markdown = submitter(stub.url("/ocr"), fast_retry()).recognize(&pdf).await;
    assert_eq!(markdown, "Hello");

    let uploads = stub.state.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.authorization, format!("Bearer {API_KEY}"));
    assert_eq!(upload.field, "file");
    assert_eq!(upload.file_name.as_deref(), Some("inv1.pdf"));
    assert_eq!(upload.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(upload.bytes, PDF_BYTES);
}

#[tokio::test]
async fn wrong_key_is_a_status_error() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "a.pdf");

    let ocr = OcrSubmitter::new(OcrSettings {
        api_key: Some("not-the-key".into()),
        endpoint: stub.url("/ocr"),
        timeout_secs: 5,
        retry: fast_retry(),
    })
    .unwrap();

    match ocr.try_recognize(&pdf).await {
        Err(ItemError::OcrStatus { status, .. }) => assert_eq!(status, 401),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn transient_503s_are_retried_until_success() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "flaky.pdf");

    let markdown = submitter(stub.url("/ocr/flaky"), fast_retry())
        .recognize(&pdf)
        .await;
    assert_eq!(markdown, "Hello");
    assert_eq!(StubState::hits(&stub.state.flaky_hits), 3);

    // Each attempt carried the full body.
    let uploads = stub.state.uploads.lock().unwrap().clone();
    assert!(uploads.iter().all(|u| u.bytes == PDF_BYTES));
}

#[tokio::test]
async fn persistent_500_gives_up_after_retry_budget() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "down.pdf");

    let ocr = submitter(stub.url("/ocr/always-500"), fast_retry());
    match ocr.try_recognize(&pdf).await {
        Err(ItemError::OcrStatus { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    // One attempt plus two retries.
    assert_eq!(StubState::hits(&stub.state.always_500_hits), 3);

    assert_eq!(ocr.recognize(&pdf).await, "");
}

#[tokio::test]
async fn no_retry_policy_sends_once() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "down.pdf");

    let ocr = submitter(stub.url("/ocr/always-500"), RetryPolicy::none());
    assert_eq!(ocr.recognize(&pdf).await, "");
    assert_eq!(StubState::hits(&stub.state.always_500_hits), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "a.pdf");

    let ocr = submitter(stub.url("/ocr/unauthorized"), fast_retry());
    assert_eq!(ocr.recognize(&pdf).await, "");
    assert_eq!(StubState::hits(&stub.state.unauthorized_hits), 1);
}

#[tokio::test]
async fn invalid_json_yields_empty_text() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "a.pdf");

    let ocr = submitter(stub.url("/ocr/bad-json"), fast_retry());
    assert!(matches!(
        ocr.try_recognize(&pdf).await,
        Err(ItemError::OcrInvalidJson { .. })
    ));
    assert_eq!(ocr.recognize(&pdf).await, "");
}

#[tokio::test]
async fn missing_or_non_string_markdown_field_yields_empty_text() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "a.pdf");

    for route in ["/ocr/missing-field", "/ocr/non-string"] {
        let ocr = submitter(stub.url(route), fast_retry());
        assert_eq!(ocr.try_recognize(&pdf).await.unwrap(), "", "route {route}");
    }
}

#[tokio::test]
async fn unreachable_endpoint_yields_empty_text() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "a.pdf");

    // Bind then drop to get a port nothing listens on.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let ocr = submitter(format!("http://127.0.0.1:{port}/ocr"), fast_retry());
    assert!(matches!(
        ocr.try_recognize(&pdf).await,
        Err(ItemError::OcrRequest { .. })
    ));
    assert_eq!(ocr.recognize(&pdf).await, "");
}

#[tokio::test]
async fn missing_key_never_touches_the_network() {
    let stub = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(&dir, "a.pdf");

    let ocr = OcrSubmitter::new(OcrSettings {
        api_key: None,
        endpoint: stub.url("/ocr"),
        ..OcrSettings::default()
    })
    .unwrap();
    assert_eq!(ocr.recognize(&pdf).await, "");
    assert_eq!(StubState::hits(&stub.state.ok_hits), 0);
}
