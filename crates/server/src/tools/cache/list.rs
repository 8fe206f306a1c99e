//! cache_list tool implementation.
//!
//! Without a store name lists the stores; with one lists its entries.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use reelcache_client::Network;
use reelcache_core::{CacheEntryMeta, CacheStorage};

use crate::host::Host;
use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Store to list entries of, e.g. "reelmind-v1.0.0".
    pub store: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Stores { stores: Vec<String> },
    Entries { store: String, entries: Vec<CacheEntryMeta> },
}

/// Implementation of the cache_list tool.
pub async fn list_impl<S, N>(host: &Host<S, N>, params: CacheListParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let output = match params.store {
        Some(store) => {
            let entries = host.entries(&store).await?;
            CacheListOutput::Entries { store, entries }
        }
        None => CacheListOutput::Stores { stores: host.stores().await? },
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::test_host;
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_list_stores() {
        let (host, storage, _) = test_host();
        host.boot().await.unwrap();
        storage.open("reelmind-v0.9.0").await.unwrap();

        let json = result_json(&list_impl(&host, CacheListParams::default()).await.unwrap());
        assert_eq!(json["stores"], serde_json::json!(["reelmind-v0.9.0", "reelmind-v1.0.0"]));
    }

    #[tokio::test]
    async fn test_list_entries() {
        let (host, _, _) = test_host();
        host.boot().await.unwrap();

        let params = CacheListParams { store: Some("reelmind-v1.0.0".into()) };
        let json = result_json(&list_impl(&host, params).await.unwrap());
        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().any(|e| e["url"] == "https://app.reelmind.ai/icon-512.png"));
    }

    #[tokio::test]
    async fn test_list_unknown_store() {
        let (host, _, _) = test_host();
        let params = CacheListParams { store: Some("reelmind-v9".into()) };
        let err = list_impl(&host, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
