//! Headless Chromium implementation of [`DocumentSource`].
//!
//! Each call launches its own browser with a throwaway profile directory,
//! so cookies and storage never leak from one invoice page to the next. The
//! browser is closed and the profile removed on every path, including
//! navigation failures and timeouts.

use super::locate::embedded_document_in;
use super::source::DocumentSource;
use crate::config::BrowserSettings;
use crate::error::ItemError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Renders pages in a fresh headless Chromium per URL.
pub struct ChromiumSource {
    settings: BrowserSettings,
}

impl ChromiumSource {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Load `url` and return the serialised DOM after navigation settled.
    pub async fn render(&self, url: &str) -> Result<String, ItemError> {
        let profile = TempDir::new().map_err(|e| {
            ItemError::BrowserLaunch(format!("cannot create profile directory: {e}"))
        })?;

        let mut builder = BrowserConfig::builder().user_data_dir(profile.path());
        if let Some(ref exe) = self.settings.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(ItemError::BrowserLaunch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ItemError::BrowserLaunch(e.to_string()))?;

        // The CDP handler must be polled for any browser call to make progress.
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let loaded =
            tokio::time::timeout(self.settings.timeout(), load_page(&browser, url)).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser for {}: {}", url, e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed for {}: {}", url, e);
        }
        events.abort();
        drop(profile);

        match loaded {
            Ok(result) => result,
            Err(_) => Err(ItemError::NavigationTimeout {
                url: url.to_string(),
                secs: self.settings.timeout_secs,
            }),
        }
    }
}

async fn load_page(browser: &Browser, url: &str) -> Result<String, ItemError> {
    let nav_err = |e: chromiumoxide::error::CdpError| ItemError::Navigation {
        url: url.to_string(),
        detail: e.to_string(),
    };

    let page = browser.new_page(url).await.map_err(nav_err)?;
    page.wait_for_navigation().await.map_err(nav_err)?;
    let html = page.content().await.map_err(nav_err)?;
    debug!("Rendered {} bytes of DOM for {}", html.len(), url);
    Ok(html)
}

#[async_trait]
impl DocumentSource for ChromiumSource {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn fetch_embedded(&self, url: &str) -> Result<Option<Vec<u8>>, ItemError> {
        info!("Opening URL: {}", url);
        let html = self.render(url).await?;
        embedded_document_in(&html)
    }
}
