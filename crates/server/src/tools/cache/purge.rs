//! cache_purge tool implementation.
//!
//! Deletes stores that neither the active nor the waiting instance uses.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use reelcache_client::Network;
use reelcache_core::CacheStorage;

use crate::host::Host;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Only purge this store. Omit to purge every unused store.
    pub store: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Names of the deleted stores.
    pub deleted: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl<S, N>(host: &Host<S, N>, params: CachePurgeParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let deleted = host.purge(params.store.as_deref()).await?;
    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::test_host;
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_purge_unused() {
        let (host, storage, _) = test_host();
        host.boot().await.unwrap();
        storage.open("reelmind-v0.8.0").await.unwrap();
        storage.open("reelmind-v0.9.0").await.unwrap();

        let json = result_json(&purge_impl(&host, CachePurgeParams::default()).await.unwrap());
        let output: CachePurgeOutput = serde_json::from_value(json).unwrap();
        assert_eq!(output.deleted, vec!["reelmind-v0.8.0", "reelmind-v0.9.0"]);
    }

    #[tokio::test]
    async fn test_purge_named_store() {
        let (host, storage, _) = test_host();
        host.boot().await.unwrap();
        storage.open("reelmind-v0.9.0").await.unwrap();

        let params = CachePurgeParams { store: Some("reelmind-v0.9.0".into()) };
        let json = result_json(&purge_impl(&host, params).await.unwrap());
        assert_eq!(json["deleted"][0], "reelmind-v0.9.0");

        let params = CachePurgeParams { store: Some("reelmind-v0.9.0".into()) };
        let json = result_json(&purge_impl(&host, params).await.unwrap());
        assert_eq!(json["deleted"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_purge_active_store_refused() {
        let (host, _, _) = test_host();
        host.boot().await.unwrap();
        let params = CachePurgeParams { store: Some("reelmind-v1.0.0".into()) };
        assert!(purge_impl(&host, params).await.is_err());
    }
}
