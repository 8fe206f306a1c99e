//! Host runtime for manager instances.
//!
//! Owns the shared store backend, network and client registry, and keeps
//! track of which instance is active and which one is waiting to take over.
//! Registration, control messages and disconnects are serialized; fetches
//! only take a short read lock to find the active instance.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use reelcache_client::{
    Intercepted, LifecycleReport, ManagerConfig, Network, OfflineCacheManager, ResponseSource, resolve,
};
use reelcache_core::{
    AppConfig, CacheEntryMeta, CacheStorage, CachedRequest, ClientId, ClientRegistry, ControlMessage, Error,
    WorkerState,
};

/// One registered instance, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct WorkerInfo {
    pub store: String,
    pub version_tag: String,
    pub state: WorkerState,
}

/// Snapshot of the host.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct HostStatus {
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub stores: Vec<String>,
    pub clients: usize,
}

struct Workers<S, N> {
    active: Option<Arc<OfflineCacheManager<S, N>>>,
    waiting: Option<Arc<OfflineCacheManager<S, N>>>,
}

pub struct Host<S, N> {
    config: AppConfig,
    origin: Url,
    storage: Arc<S>,
    network: Arc<N>,
    clients: ClientRegistry,
    workers: RwLock<Workers<S, N>>,
    control: Mutex<()>,
}

fn info<S, N>(manager: &OfflineCacheManager<S, N>) -> WorkerInfo
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    WorkerInfo {
        store: manager.store_name().to_string(),
        version_tag: manager.version().tag().to_string(),
        state: manager.state(),
    }
}

impl<S, N> Host<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    pub fn new(config: AppConfig, storage: Arc<S>, network: Arc<N>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            config,
            origin,
            storage,
            network,
            clients: ClientRegistry::new(),
            workers: RwLock::new(Workers { active: None, waiting: None }),
            control: Mutex::new(()),
        })
    }

    /// Install the configured version.
    pub async fn boot(&self) -> Result<LifecycleReport, Error> {
        self.register(None).await
    }

    /// Install a new instance for `version_tag` (default: configured tag).
    ///
    /// While the active instance still controls clients the new one waits;
    /// a previously waiting instance is replaced.
    pub async fn register(&self, version_tag: Option<&str>) -> Result<LifecycleReport, Error> {
        let _guard = self.control.lock().await;
        let config = ManagerConfig::from_app(&self.config, version_tag)?;

        let active = self.workers.read().await.active.clone();
        if let Some(active) = &active
            && active.store_name() == config.version.store_name()
        {
            return Err(Error::InvalidInput(format!("{} is already active", active.store_name())));
        }

        let has_predecessor = match &active {
            Some(active) => self.clients.controlled_by(active.store_name()).await > 0,
            None => false,
        };

        let manager = Arc::new(OfflineCacheManager::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.network),
            self.clients.clone(),
            config,
            has_predecessor,
        ));
        tracing::info!(store = %manager.store_name(), has_predecessor, "registering instance");

        let report = manager.install().await?;
        match report.state {
            WorkerState::Active => self.promote(manager).await,
            WorkerState::Waiting => {
                let replaced = self.workers.write().await.waiting.replace(manager);
                if let Some(replaced) = replaced {
                    Self::retire(&replaced).await;
                }
            }
            state => tracing::warn!(store = %manager.store_name(), %state, "instance did not install"),
        }

        Ok(report)
    }

    /// Deliver a control message to the waiting instance, else the active one.
    pub async fn post_message(&self, message: serde_json::Value) -> Result<LifecycleReport, Error> {
        let message = match ControlMessage::from_value(message) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring control message");
                return Err(e);
            }
        };

        let _guard = self.control.lock().await;
        let (target, is_waiting) = {
            let workers = self.workers.read().await;
            match (&workers.waiting, &workers.active) {
                (Some(waiting), _) => (Arc::clone(waiting), true),
                (None, Some(active)) => (Arc::clone(active), false),
                (None, None) => return Err(Error::NoWorker("no instance to receive message".into())),
            }
        };

        if is_waiting {
            self.quiesce_active().await;
        }
        let report = target.handle_message(message).await?;
        if is_waiting && report.state == WorkerState::Active {
            self.promote(target).await;
        }
        Ok(report)
    }

    /// Register a page; it is controlled by the active instance, if any.
    pub async fn connect(&self) -> ClientId {
        let controller = self
            .workers
            .read()
            .await
            .active
            .as_ref()
            .map(|m| m.store_name().to_string());
        self.clients.connect(controller).await
    }

    /// Drop a page. When the active instance loses its last client, a
    /// waiting instance takes over.
    pub async fn disconnect(&self, id: ClientId) -> Result<Option<LifecycleReport>, Error> {
        let _guard = self.control.lock().await;
        if !self.clients.disconnect(id).await {
            return Err(Error::InvalidInput(format!("unknown client {id}")));
        }

        let (waiting, active_store) = {
            let workers = self.workers.read().await;
            (workers.waiting.clone(), workers.active.as_ref().map(|m| m.store_name().to_string()))
        };
        let Some(waiting) = waiting else {
            return Ok(None);
        };
        if let Some(store) = active_store
            && self.clients.controlled_by(&store).await > 0
        {
            return Ok(None);
        }

        self.quiesce_active().await;
        let report = waiting.release_predecessor().await?;
        if report.state == WorkerState::Active {
            self.promote(waiting).await;
        }
        Ok(Some(report))
    }

    /// Route a page request through the active instance.
    ///
    /// Without an active instance the request goes straight to the network.
    pub async fn fetch(&self, mut request: CachedRequest) -> Result<Intercepted, Error> {
        request.url = resolve(&self.origin, &request.url)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?
            .to_string();

        let active = self.workers.read().await.active.clone();
        match active {
            Some(manager) => manager.intercept(request).await,
            None => {
                let response = self.network.fetch(&request).await?;
                Ok(Intercepted { response, source: ResponseSource::Network })
            }
        }
    }

    pub async fn status(&self) -> Result<HostStatus, Error> {
        let (active, waiting) = {
            let workers = self.workers.read().await;
            (workers.active.as_deref().map(info), workers.waiting.as_deref().map(info))
        };
        Ok(HostStatus { active, waiting, stores: self.storage.keys().await?, clients: self.clients.len().await })
    }

    pub async fn stores(&self) -> Result<Vec<String>, Error> {
        self.storage.keys().await
    }

    pub async fn entries(&self, store: &str) -> Result<Vec<CacheEntryMeta>, Error> {
        if !self.storage.has(store).await? {
            return Err(Error::InvalidInput(format!("no such store: {store}")));
        }
        self.storage.entries(store).await
    }

    /// Delete stores no registered instance uses.
    ///
    /// With `store` set only that one is considered.
    pub async fn purge(&self, store: Option<&str>) -> Result<Vec<String>, Error> {
        let _guard = self.control.lock().await;
        let in_use: Vec<String> = {
            let workers = self.workers.read().await;
            [&workers.active, &workers.waiting]
                .into_iter()
                .flatten()
                .map(|m| m.store_name().to_string())
                .collect()
        };

        let candidates = match store {
            Some(name) if in_use.iter().any(|n| n == name) => {
                return Err(Error::InvalidInput(format!("{name} is in use")));
            }
            Some(name) => vec![name.to_string()],
            None => self
                .storage
                .keys()
                .await?
                .into_iter()
                .filter(|n| !in_use.contains(n))
                .collect(),
        };

        let mut deleted = Vec::new();
        for name in candidates {
            if self.storage.delete(&name).await? {
                tracing::info!(store = %name, "purged store");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Wait for outstanding cache writes.
    pub async fn shutdown(&self) {
        let workers = self.workers.read().await;
        for manager in [&workers.active, &workers.waiting].into_iter().flatten() {
            manager.flush().await;
        }
    }

    async fn promote(&self, manager: Arc<OfflineCacheManager<S, N>>) {
        let previous = {
            let mut workers = self.workers.write().await;
            if workers
                .waiting
                .as_ref()
                .is_some_and(|w| Arc::ptr_eq(w, &manager))
            {
                workers.waiting = None;
            }
            workers.active.replace(manager)
        };
        if let Some(previous) = previous {
            Self::retire(&previous).await;
        }
    }

    /// Stop the active instance before a waiting one purges its store:
    /// no more interception, and no background write left to land.
    async fn quiesce_active(&self) {
        let active = self.workers.read().await.active.clone();
        if let Some(active) = active {
            Self::retire(&active).await;
        }
    }

    async fn retire(manager: &OfflineCacheManager<S, N>) {
        if manager.state() != WorkerState::Redundant
            && let Err(e) = manager.supersede().await
        {
            tracing::warn!(store = %manager.store_name(), error = %e, "failed to retire instance");
        }
        manager.flush().await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use reelcache_core::{CachedResponse, MemoryStorage};

    use super::*;

    pub const ORIGIN: &str = "https://app.reelmind.ai";

    /// Serves the default manifest plus anything added with `serve`.
    #[derive(Default)]
    pub struct FakeNetwork {
        responses: std::sync::Mutex<HashMap<String, CachedResponse>>,
        offline: AtomicBool,
    }

    impl FakeNetwork {
        pub fn new() -> Self {
            let network = Self::default();
            for path in ["/", "/index.html", "/icon-192.png", "/icon-512.png"] {
                network.serve(path, CachedResponse::new(200, format!("asset {path}")));
            }
            network
        }

        pub fn serve(&self, path: &str, response: CachedResponse) {
            self.responses
                .lock()
                .unwrap()
                .insert(format!("{ORIGIN}{path}"), response);
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &CachedRequest) -> Result<CachedResponse, Error> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network(format!("offline: {}", request.url)));
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| CachedResponse::new(404, "not found")))
        }
    }

    pub type TestHost = Host<MemoryStorage, FakeNetwork>;

    pub fn test_host() -> (TestHost, Arc<MemoryStorage>, Arc<FakeNetwork>) {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::new());
        let config = AppConfig { origin: ORIGIN.into(), ..Default::default() };
        let host = Host::new(config, Arc::clone(&storage), Arc::clone(&network)).unwrap();
        (host, storage, network)
    }
}
