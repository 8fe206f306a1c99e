//! Network side of request interception.
//!
//! ### Failure model
//! - Only transport failures are errors: connect refused, DNS, timeout,
//!   truncated body. These are what trigger the cache fallback.
//! - Every HTTP status, including 404 and 500, is a normal response.
//!
//! ### Limits
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 5MB (configurable)

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, header};

use reelcache_core::{AppConfig, CachedRequest, CachedResponse, Error};

pub use url::{UrlError, canonicalize, resolve};

/// Anything that can turn a request into a response.
///
/// The manager only talks to the network through this trait, so tests can
/// script connectivity.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request.
    ///
    /// # Errors
    ///
    /// `Error::Network` when no response was received at all.
    async fn fetch(&self, request: &CachedRequest) -> Result<CachedResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "reelcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "reelcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Network(format!("timeout fetching {url}: {err}"))
    } else {
        Error::Network(format!("failed to fetch {url}: {err}"))
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &CachedRequest) -> Result<CachedResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| transport_error(&request.url, &e))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let mut headers = Vec::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(v) => headers.push((name.to_string(), v.to_string())),
                Err(_) => tracing::debug!(url = %request.url, header = %name, "dropping non-UTF-8 header value"),
            }
        }

        let body = response.bytes().await.map_err(|e| transport_error(&request.url, &e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "network response"
        );

        Ok(CachedResponse { status: status.as_u16(), headers, body })
    }
}

/// Content-Type of a response, if present.
pub fn content_type(response: &CachedResponse) -> Option<&str> {
    response.header(header::CONTENT_TYPE.as_str())
}
