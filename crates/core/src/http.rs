//! Request and response snapshots exchanged between the page, the network
//! and the cache stores.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An outgoing request from a controlled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRequest {
    /// Upper-cased HTTP method.
    pub method: String,
    /// Absolute request URL.
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Only meaningful for requests that pass straight through to the network.
    #[serde(default)]
    pub body: Option<Bytes>,
}

impl CachedRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url: url.into(), headers: Vec::new(), body: None }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only GET requests are ever served from or written to a store.
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Store key for this request (method + URL).
    pub fn key(&self) -> String {
        crate::cache::hash::compute_request_key(&self.method, &self.url)
    }
}

/// A captured response: status, headers and body.
///
/// The body is reference-counted, so cloning a response to write it into a
/// store does not copy the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Only status 200 responses are cacheable.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
