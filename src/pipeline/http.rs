//! HTTP client that retries transient server errors with exponential backoff.
//!
//! ## Retry Strategy
//!
//! A request is retried when its method is in
//! [`RetryPolicy::allowed_methods`] and either the response status is in
//! [`RetryPolicy::status_forcelist`] or the transport failed to connect / timed
//! out. The first retry goes out immediately and the sleep before retry
//! `n >= 2` is `backoff_factor * 2^(n-1)`; with the defaults (2 retries,
//! factor 0.3) the wait sequence is 0 s → 0.6 s.
//!
//! Multipart bodies are single-use, so callers hand in a closure that builds
//! the request afresh for every attempt.

use crate::config::RetryPolicy;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// A reusable client carrying a [`RetryPolicy`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    inner: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    /// Build a client with a per-request `timeout`.
    ///
    /// The policy applies to `http` and `https` URLs alike.
    pub fn new(policy: RetryPolicy, timeout: Duration) -> reqwest::Result<Self> {
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self { inner, policy })
    }

    /// Send a request, retrying per the policy.
    ///
    /// `build` receives a fresh `RequestBuilder` for `method url` on each
    /// attempt and may attach headers and a body. Once retries are exhausted
    /// the last response is returned as-is (the caller decides what a 5xx
    /// means), or the last transport error.
    pub async fn send<F>(&self, method: Method, url: &str, build: F) -> reqwest::Result<Response>
    where
        F: Fn(RequestBuilder) -> reqwest::Result<RequestBuilder>,
    {
        let retryable_method = self.policy.allows(&method);
        let max_retries = if retryable_method { self.policy.total } else { 0 };

        let mut attempt = 0;
        loop {
            let request = build(self.inner.request(method.clone(), url))?;

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if attempt < max_retries && self.policy.is_retryable_status(status) {
                        attempt += 1;
                        let backoff = self.policy.backoff_for(attempt);
                        warn!(
                            "{} {}: HTTP {}; retry {}/{} after {}ms",
                            method,
                            url,
                            status,
                            attempt,
                            max_retries,
                            backoff.as_millis()
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt < max_retries && is_transient(&e) {
                        attempt += 1;
                        let backoff = self.policy.backoff_for(attempt);
                        warn!(
                            "{} {}: {}; retry {}/{} after {}ms",
                            method,
                            url,
                            e,
                            attempt,
                            max_retries,
                            backoff.as_millis()
                        );
                        sleep(backoff).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}
