//! reqwest-backed fetcher
//!
//! Resolves request paths against a base URL and converts the reply into an
//! [`HttpResponse`].

use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{FetchError, Fetcher, HttpResponse, Request};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for fetching responses from an upstream HTTP service
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a new HttpFetcher with default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a new HttpFetcher with a custom HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and the request path with exactly one slash
    fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetch a response for the given request
    ///
    /// # Returns
    /// * `Ok(HttpResponse)` - Any response the server sent, including 4xx/5xx
    /// * `Err(FetchError)` - If the request could not be completed
    async fn fetch(&self, request: &Request) -> Result<HttpResponse, FetchError> {
        let url = self.url_for(&request.path);

        let response = self
            .client
            .get(&url)
            .query(&request.query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.classify(e))?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpFetcher {
    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::RequestFailed(error)
        }
    }
}
