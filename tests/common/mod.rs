//! In-process stub server: invoice pages plus a fake OCR endpoint.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine};
use chandra_ingest::RetryPolicy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

pub const API_KEY: &str = "test-key";
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%stub invoice\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

/// One multipart upload as seen by the stub.
#[derive(Debug, Clone)]
pub struct Upload {
    pub authorization: String,
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct StubState {
    pub uploads: Mutex<Vec<Upload>>,
    pub ok_hits: AtomicUsize,
    pub flaky_hits: AtomicUsize,
    pub always_500_hits: AtomicUsize,
    pub unauthorized_hits: AtomicUsize,
}

impl StubState {
    pub fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct Stub {
    pub base: String,
    pub state: Arc<StubState>,
}

impl Stub {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

pub fn data_uri() -> String {
    format!("data:application/pdf;base64,{}", STANDARD.encode(PDF_BYTES))
}

/// Retry quickly so the flaky routes don't slow the suite down.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        backoff_factor: 0.01,
        ..RetryPolicy::default()
    }
}

/// Route crate logs through the test harness so `--nocapture` shows them.
/// Override the level with `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chandra_ingest=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub async fn spawn_stub() -> Stub {
    init_tracing();
    let state = Arc::new(StubState::default());
    let app = Router::new()
        .route("/inv1.html", get(embed_page))
        .route("/viewer.php", get(iframe_page))
        .route("/scripted.html", get(script_page))
        .route("/plain.html", get(plain_page))
        .route("/gone.html", get(|| async { StatusCode::NOT_FOUND }))
        .route("/ocr", post(ocr_ok))
        .route("/ocr/flaky", post(ocr_flaky))
        .route("/ocr/always-500", post(ocr_always_500))
        .route("/ocr/unauthorized", post(ocr_unauthorized))
        .route(
            "/ocr/bad-json",
            post(|_body: Bytes| async { "<html>definitely not json</html>" }),
        )
        .route(
            "/ocr/missing-field",
            post(|_body: Bytes| async { Json(serde_json::json!({ "text": "wrong key" })) }),
        )
        .route(
            "/ocr/non-string",
            post(|_body: Bytes| async { Json(serde_json::json!({ "markdown": 42 })) }),
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Stub {
        base: format!("http://{addr}"),
        state,
    }
}

async fn embed_page() -> Html<String> {
    Html(format!(
        r#"<html><body><h1>Invoice 1</h1>
<embed type="application/pdf" src="{}" width="100%"></body></html>"#,
        data_uri()
    ))
}

async fn iframe_page() -> Html<String> {
    Html(format!(
        r#"<html><body><iframe src="{}"></iframe></body></html>"#,
        data_uri()
    ))
}

async fn script_page() -> Html<String> {
    Html(format!(
        r#"<html><head><script>
window.invoice = {{ id: 3, doc: "{}" }};
</script></head><body>loading…</body></html>"#,
        data_uri()
    ))
}

async fn plain_page() -> Html<&'static str> {
    Html("<html><body><p>Your invoice is not ready yet.</p></body></html>")
}

async fn record_upload(state: &StubState, headers: &HeaderMap, mut multipart: Multipart) -> Upload {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut upload = Upload {
        authorization,
        field: String::new(),
        file_name: None,
        content_type: None,
        bytes: Vec::new(),
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        upload.field = field.name().unwrap_or_default().to_string();
        upload.file_name = field.file_name().map(str::to_string);
        upload.content_type = field.content_type().map(str::to_string);
        upload.bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
    }
    state.uploads.lock().unwrap().push(upload.clone());
    upload
}

fn hello() -> Response {
    Json(serde_json::json!({ "markdown": "Hello" })).into_response()
}

async fn ocr_ok(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    state.ok_hits.fetch_add(1, Ordering::SeqCst);
    let upload = record_upload(&state, &headers, multipart).await;
    if upload.authorization != format!("Bearer {API_KEY}") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    hello()
}

/// 503 twice, then success.
async fn ocr_flaky(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let n = state.flaky_hits.fetch_add(1, Ordering::SeqCst);
    record_upload(&state, &headers, multipart).await;
    if n < 2 {
        return (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response();
    }
    hello()
}

async fn ocr_always_500(State(state): State<Arc<StubState>>, _body: Bytes) -> Response {
    state.always_500_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn ocr_unauthorized(State(state): State<Arc<StubState>>, _body: Bytes) -> Response {
    state.unauthorized_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, r#"{"error":"invalid api key"}"#).into_response()
}
