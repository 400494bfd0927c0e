//! OCR submission: upload a PDF, get Markdown back.
//!
//! Wire contract: multipart `POST` to the configured endpoint with
//! `Authorization: Bearer <key>` and the PDF in the `file` field; the
//! response is `{"markdown": "<string>"}`. Any other shape yields empty text.
//!
//! [`TextRecognizer::recognize`] never fails: every error is logged and
//! turned into `""`, so the orchestrator always has something to persist.
//! [`OcrSubmitter::try_recognize`] exposes the underlying [`ItemError`].

use super::http::RetryingClient;
use crate::config::OcrSettings;
use crate::error::{IngestError, ItemError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::path::Path;
use tracing::{error, info, warn};

/// Turns a PDF on disk into Markdown text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Markdown for `pdf_path`; `""` when nothing could be recognised.
    async fn recognize(&self, pdf_path: &Path) -> String;
}

/// Client for the remote OCR endpoint.
pub struct OcrSubmitter {
    settings: OcrSettings,
    client: RetryingClient,
}

impl OcrSubmitter {
    pub fn new(settings: OcrSettings) -> Result<Self, IngestError> {
        let client = RetryingClient::new(settings.retry.clone(), settings.timeout())
            .map_err(|e| IngestError::Client(e.to_string()))?;
        Ok(Self { settings, client })
    }

    /// Upload `pdf_path` and return the `markdown` field.
    ///
    /// Preconditions (credentials, file existence) are checked before any
    /// network call. An absent or empty `markdown` field is not an error: it
    /// yields `Ok("")` with a warning.
    pub async fn try_recognize(&self, pdf_path: &Path) -> Result<String, ItemError> {
        let file = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| pdf_path.display().to_string());
        info!("Sending to OCR: {}", file);

        let api_key = match self.settings.api_key.as_deref() {
            Some(key) if self.settings.is_configured() => key,
            _ => return Err(ItemError::OcrNotConfigured),
        };

        let data = match tokio::fs::read(pdf_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ItemError::DocumentMissing {
                    path: pdf_path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(ItemError::OcrRequest {
                    file,
                    detail: format!("cannot read PDF: {e}"),
                })
            }
        };

        let response = self
            .client
            .send(Method::POST, &self.settings.endpoint, |req| {
                let part = Part::bytes(data.clone())
                    .file_name(file.clone())
                    .mime_str("application/pdf")?;
                Ok(req.bearer_auth(api_key).multipart(Form::new().part("file", part)))
            })
            .await
            .map_err(|e| ItemError::OcrRequest {
                file: file.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ItemError::OcrStatus {
                file,
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let body = response.text().await.map_err(|e| ItemError::OcrRequest {
            file: file.clone(),
            detail: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ItemError::OcrInvalidJson {
                file: file.clone(),
                detail: e.to_string(),
            })?;

        let markdown = json
            .get("markdown")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        if markdown.is_empty() {
            warn!("OCR returned empty markdown for {}", file);
        }
        Ok(markdown)
    }
}

#[async_trait]
impl TextRecognizer for OcrSubmitter {
    async fn recognize(&self, pdf_path: &Path) -> String {
        match self.try_recognize(pdf_path).await {
            Ok(markdown) => markdown,
            Err(e) => {
                error!("{}", e);
                String::new()
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: Option<&str>) -> OcrSettings {
        OcrSettings {
            api_key: key.map(str::to_string),
            // Unroutable: any accidental network call would fail loudly.
            endpoint: "http://127.0.0.1:9/ocr".into(),
            ..OcrSettings::default()
        }
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        let ocr = OcrSubmitter::new(settings(None)).unwrap();
        assert!(matches!(
            ocr.try_recognize(&pdf).await,
            Err(ItemError::OcrNotConfigured)
        ));
        assert_eq!(ocr.recognize(&pdf).await, "");
    }

    #[tokio::test]
    async fn missing_endpoint_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        let mut s = settings(Some("k"));
        s.endpoint = String::new();
        let ocr = OcrSubmitter::new(s).unwrap();
        assert!(matches!(
            ocr.try_recognize(&pdf).await,
            Err(ItemError::OcrNotConfigured)
        ));
    }

    #[tokio::test]
    async fn missing_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = OcrSubmitter::new(settings(Some("k"))).unwrap();
        let missing = dir.path().join("nope.pdf");
        assert!(matches!(
            ocr.try_recognize(&missing).await,
            Err(ItemError::DocumentMissing { .. })
        ));
        assert_eq!(ocr.recognize(&missing).await, "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("héllo", 2), "hé\u{2026}");
    }
}
