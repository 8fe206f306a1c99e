//! client_connect and client_disconnect tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use reelcache_client::{LifecycleReport, Network};
use reelcache_core::{CacheStorage, ClientId};

use super::json_result;
use crate::host::Host;

/// Parameters for the client_disconnect tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientDisconnectParams {
    /// Id returned by client_connect.
    pub client_id: ClientId,
}

/// Output from the client_connect tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientConnectOutput {
    pub client_id: ClientId,
}

/// Output from the client_disconnect tool.
#[derive(Debug, Clone, Serialize)]
pub struct ClientDisconnectOutput {
    pub client_id: ClientId,
    /// Set when the disconnect let a waiting instance take over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<LifecycleReport>,
}

/// Implementation of the client_connect tool.
pub async fn connect_impl<S, N>(host: &Host<S, N>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let client_id = host.connect().await;
    json_result(&ClientConnectOutput { client_id })
}

/// Implementation of the client_disconnect tool.
pub async fn disconnect_impl<S, N>(
    host: &Host<S, N>, params: ClientDisconnectParams,
) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let handoff = host.disconnect(params.client_id).await?;
    json_result(&ClientDisconnectOutput { client_id: params.client_id, handoff })
}
