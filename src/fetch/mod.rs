//! The network side of the cache
//!
//! A [`Fetcher`] turns a [`Request`] into an [`HttpResponse`] or a
//! [`FetchError`]. Any response that arrived over the wire is a success, whatever
//! its status; only transport failures are errors.

mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::form_urlencoded::Serializer;

/// Errors that can occur while fetching from upstream
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A GET request identified by its path and query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// The caller-facing cache identity: lower-cased path, then the
    /// form-urlencoded query when there is one
    pub fn logical_key(&self) -> String {
        let mut key = self.path.to_lowercase();
        key.push_str(&self.query_string());
        key
    }

    /// Path and query as they appear in log lines
    pub fn display(&self) -> String {
        format!("{}{}", self.path, self.query_string())
    }

    /// Encoded the same way reqwest puts the pairs on the wire
    fn query_string(&self) -> String {
        if self.query.is_empty() {
            return String::new();
        }
        let mut serializer = Serializer::new(String::from("?"));
        serializer.extend_pairs(&self.query);
        serializer.finish()
    }
}

/// A response as cached and returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lower-cased
    pub headers: BTreeMap<String, String>,
    /// Raw payload bytes, base64 in the serialized form
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, normalizing its name
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Only plain 200 responses are ever written to the cache
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// The `max-age` from `Cache-Control`, if any
    pub fn max_age(&self) -> Option<Duration> {
        self.header("cache-control").and_then(parse_max_age)
    }
}

mod base64_body {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

/// Extracts `max-age=N` from a `Cache-Control` value
///
/// Directive names match case-insensitively and quoted values are accepted.
/// A malformed number yields `None`.
pub fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    })
}

/// Performs the actual network request
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<HttpResponse, FetchError>;
}
