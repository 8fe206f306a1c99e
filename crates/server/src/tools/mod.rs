//! MCP tool implementations.
//!
//! This module contains all tools exposed by the reelcache server. Each
//! `*_impl` takes the host explicitly so it can be tested without a
//! transport.

pub mod cache;
pub mod clients;
pub mod fetch;
pub mod worker;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use reelcache_core::Error;

pub use cache::{CacheListParams, CachePurgeParams};
pub use clients::ClientDisconnectParams;
pub use fetch::FetchParams;
pub use worker::{WorkerMessageParams, WorkerRegisterParams};

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
