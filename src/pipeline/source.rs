//! The narrow capability the extractor needs from a page loader.
//!
//! [`DocumentSource`] answers one question: "given a URL, what are the raw
//! bytes of the document embedded in that page, if any?". The orchestrator
//! and extractor only ever see this trait, so tests plug in canned sources
//! and the CLI picks between a headless browser
//! ([`crate::pipeline::browser::ChromiumSource`]) and a plain HTTP fetch
//! ([`HttpPageSource`]).

use super::locate::embedded_document_in;
use crate::error::{IngestError, ItemError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Loads a page and returns the embedded document bytes, if any.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// `Ok(None)` means the page loaded but carries no embedded document.
    async fn fetch_embedded(&self, url: &str) -> Result<Option<Vec<u8>>, ItemError>;
}

/// Fetches raw markup over HTTP; no script execution.
///
/// Sufficient for viewers that inline the data URI server-side.
pub struct HttpPageSource {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPageSource {
    pub fn new(timeout_secs: u64) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl DocumentSource for HttpPageSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_embedded(&self, url: &str) -> Result<Option<Vec<u8>>, ItemError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ItemError::NavigationTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ItemError::Navigation {
                    url: url.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(ItemError::Navigation {
                url: url.to_string(),
                detail: format!("HTTP {}", response.status()),
            });
        }

        let html = response.text().await.map_err(|e| ItemError::Navigation {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        debug!("Fetched {} bytes of markup from {}", html.len(), url);

        embedded_document_in(&html)
    }
}
