//! Lifecycle tools: worker_status, worker_register, worker_message.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use reelcache_client::Network;
use reelcache_core::CacheStorage;

use super::json_result;
use crate::host::Host;

/// Parameters for the worker_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerRegisterParams {
    /// Version tag of the new instance, e.g. "v1.0.1".
    pub version_tag: String,
}

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message posted by the page. Only `{"type": "SKIP_WAITING"}` is understood.
    pub message: serde_json::Value,
}

/// Implementation of the worker_status tool.
pub async fn status_impl<S, N>(host: &Host<S, N>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    json_result(&host.status().await?)
}

/// Implementation of the worker_register tool.
pub async fn register_impl<S, N>(host: &Host<S, N>, params: WorkerRegisterParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let report = host.register(Some(params.version_tag.trim())).await?;
    json_result(&report)
}

/// Implementation of the worker_message tool.
pub async fn message_impl<S, N>(host: &Host<S, N>, params: WorkerMessageParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let report = host.post_message(params.message).await?;
    json_result(&report)
}
