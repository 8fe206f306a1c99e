//! fetch tool implementation.
//!
//! Routes a page request through the active instance, network first with
//! cache fallback.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use reelcache_client::{Network, ResponseSource, fetch::content_type};
use reelcache_core::{CacheStorage, CachedRequest, Error};

use super::json_result;
use crate::host::Host;

fn default_method() -> String {
    "GET".to_string()
}

/// Parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests touch the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as UTF-8.
    pub body: Option<String>,
}

/// Output from the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    pub status: u16,
    /// "network" or "cache".
    pub source: String,
    pub content_type: Option<String>,
    /// Response headers in arrival order; repeated names stay separate.
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
}

/// Implementation of the fetch tool.
pub async fn fetch_impl<S, N>(host: &Host<S, N>, params: FetchParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url must not be empty".to_string()).into());
    }

    let mut request = CachedRequest::new(&params.method, params.url.trim());
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let intercepted = host.fetch(request).await?;
    let response = &intercepted.response;

    let source = match intercepted.source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
    };

    let output = FetchOutput {
        status: response.status,
        source: source.to_string(),
        content_type: content_type(response).map(str::to_string),
        headers: response.headers.clone(),
        body_len: response.body.len(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    };
    json_result(&output)
}
