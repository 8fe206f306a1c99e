//! In-process [`CacheStorage`] backed by ordered maps.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CacheEntryMeta, CacheStorage};
use crate::Error;
use crate::http::{CachedRequest, CachedResponse};

#[derive(Debug, Clone)]
struct Entry {
    request: CachedRequest,
    response: CachedResponse,
    stored_at: String,
}

type Store = BTreeMap<String, Entry>;

/// Non-persistent storage. Clones share the same stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<BTreeMap<String, Store>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.stores.write().await.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.read().await.contains_key(name))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn put_all(&self, name: &str, entries: Vec<(CachedRequest, CachedResponse)>) -> Result<(), Error> {
        let stored_at = Utc::now().to_rfc3339();
        let mut stores = self.stores.write().await;
        let store = stores.entry(name.to_string()).or_default();
        for (request, response) in entries {
            store.insert(request.key(), Entry { request, response, stored_at: stored_at.clone() });
        }
        Ok(())
    }

    async fn put_existing(
        &self, name: &str, request: &CachedRequest, response: &CachedResponse,
    ) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let Some(store) = stores.get_mut(name) else {
            return Ok(false);
        };
        let entry = Entry { request: request.clone(), response: response.clone(), stored_at: Utc::now().to_rfc3339() };
        store.insert(request.key(), entry);
        Ok(true)
    }

    async fn match_request(&self, name: &str, request: &CachedRequest) -> Result<Option<CachedResponse>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(name)
            .and_then(|store| store.get(&request.key()))
            .map(|entry| entry.response.clone()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheEntryMeta>, Error> {
        let stores = self.stores.read().await;
        let Some(store) = stores.get(name) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<CacheEntryMeta> = store
            .iter()
            .map(|(key, entry)| CacheEntryMeta {
                key: key.clone(),
                method: entry.request.method.clone(),
                url: entry.request.url.clone(),
                status: entry.response.status,
                stored_at: entry.stored_at.clone(),
                body_len: entry.response.body.len(),
            })
            .collect();
        entries.sort_by(|a, b| a.stored_at.cmp(&b.stored_at).then_with(|| a.url.cmp(&b.url)));
        Ok(entries)
    }
}
