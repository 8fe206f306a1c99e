//! Registry of connected client pages and which instance controls each.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

/// Identifier handed out on connect.
pub type ClientId = u64;

/// Shared between every manager instance of a host. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<BTreeMap<ClientId, Option<String>>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page, controlled by `controller` (the store name of the
    /// active instance) if there is one.
    pub async fn connect(&self, controller: Option<String>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.clients.write().await.insert(id, controller);
        id
    }

    /// Returns false if the client was unknown.
    pub async fn disconnect(&self, id: ClientId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    /// Take control of every connected client. Returns how many changed hands.
    pub async fn claim(&self, controller: &str) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for current in clients.values_mut() {
            if current.as_deref() != Some(controller) {
                *current = Some(controller.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    pub async fn controller(&self, id: ClientId) -> Option<String> {
        self.clients.read().await.get(&id).cloned().flatten()
    }

    pub async fn controlled_by(&self, controller: &str) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.as_deref() == Some(controller))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_assigns_unique_ids() {
        let registry = ClientRegistry::new();
        let a = registry.connect(None).await;
        let b = registry.connect(Some("reelmind-v1.0.0".into())).await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.controller(a).await, None);
        assert_eq!(registry.controller(b).await.as_deref(), Some("reelmind-v1.0.0"));
    }

    #[tokio::test]
    async fn test_claim_takes_all_clients() {
        let registry = ClientRegistry::new();
        registry.connect(None).await;
        registry.connect(Some("reelmind-v1.0.0".into())).await;
        registry.connect(Some("reelmind-v1.0.1".into())).await;

        assert_eq!(registry.claim("reelmind-v1.0.1").await, 2);
        assert_eq!(registry.controlled_by("reelmind-v1.0.1").await, 3);
        assert_eq!(registry.controlled_by("reelmind-v1.0.0").await, 0);
    }

    #[tokio::test]
    async fn test_disconnect() {
        let registry = ClientRegistry::new();
        let id = registry.connect(Some("reelmind-v1.0.0".into())).await;
        assert!(registry.disconnect(id).await);
        assert!(!registry.disconnect(id).await);
        assert_eq!(registry.len().await, 0);
        assert_eq!(registry.controlled_by("reelmind-v1.0.0").await, 0);
    }
}
