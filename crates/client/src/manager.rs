//! Offline cache manager.
//!
//! One instance per version tag. The instance owns no global state: the
//! store backend, the network and the client registry are injected, and
//! every lifecycle change goes through [`Lifecycle::apply`]. Lifecycle
//! events are handled one at a time; request interception runs
//! concurrently with them and with itself.
//!
//! Interception is network-first for every GET:
//!
//! 1. Non-GET requests go to the network untouched.
//! 2. A 200 response is copied into the active store in the background and
//!    returned without waiting for the write.
//! 3. Only a transport failure falls back to the store; a miss there is
//!    reported as [`Error::CacheMiss`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinSet;
use url::Url;

use reelcache_core::{
    AppConfig, CacheStorage, CacheVersion, CachedRequest, CachedResponse, ClientRegistry, ControlMessage, Effect, Error,
    InstallPolicy, Lifecycle, LifecycleEvent, PrecacheFailure, PrecacheManifest, PrecacheOutcome, WorkerState,
};

use crate::fetch::{Network, resolve};

/// Static settings of one manager instance.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub version: CacheVersion,
    pub manifest: PrecacheManifest,
    /// Manifest paths resolve against this.
    pub origin: Url,
    pub policy: InstallPolicy,
}

impl ManagerConfig {
    /// Settings for `version_tag` (or the configured tag) from app config.
    pub fn from_app(config: &AppConfig, version_tag: Option<&str>) -> Result<Self, Error> {
        let invalid = |e: reelcache_core::ConfigError| Error::InvalidInput(e.to_string());
        let mut version = config.cache_version().map_err(invalid)?;
        if let Some(tag) = version_tag {
            version = version.with_tag(tag)?;
        }

        Ok(Self {
            version,
            manifest: config.manifest().map_err(invalid)?,
            origin: Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?,
            policy: config.install_policy(),
        })
    }
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// Response handed back to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intercepted {
    pub response: CachedResponse,
    pub source: ResponseSource,
}

/// Result of the activate step: stale stores purged, clients claimed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub deleted_stores: Vec<String>,
    pub claimed_clients: usize,
}

/// What a lifecycle call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub state: WorkerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precache: Option<PrecacheOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationReport>,
}

/// Network-first cache manager for one version tag.
pub struct OfflineCacheManager<S, N> {
    storage: Arc<S>,
    network: Arc<N>,
    clients: ClientRegistry,
    config: ManagerConfig,
    store_name: String,
    machine: AsyncMutex<Machine>,
    state: watch::Sender<WorkerState>,
    pending_writes: Mutex<JoinSet<()>>,
}

/// Lifecycle position plus effects not yet run (the start effects until
/// `install` picks them up).
struct Machine {
    lifecycle: Lifecycle,
    pending: Vec<Effect>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S, N> OfflineCacheManager<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// Register a new instance in `installing`.
    ///
    /// `has_predecessor` is true when another instance currently controls
    /// clients; the new one then waits after install instead of activating.
    pub fn new(
        storage: Arc<S>, network: Arc<N>, clients: ClientRegistry, config: ManagerConfig, has_predecessor: bool,
    ) -> Self {
        let start = Lifecycle::start(has_predecessor);
        let store_name = config.version.store_name();
        let (state, _) = watch::channel(start.lifecycle.state());

        Self {
            storage,
            network,
            clients,
            config,
            store_name,
            machine: AsyncMutex::new(Machine { lifecycle: start.lifecycle, pending: start.effects }),
            state,
            pending_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn version(&self) -> &CacheVersion {
        &self.config.version
    }

    /// Name of the store this instance reads and writes.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Run the install step: open the store and precache the manifest.
    ///
    /// Continues into activation when nothing needs to be waited for.
    pub async fn install(&self) -> Result<LifecycleReport, Error> {
        let mut machine = self.machine.lock().await;
        if machine.lifecycle.state() != WorkerState::Installing || machine.pending.is_empty() {
            return Err(Error::InvalidInput(format!("{} is already {}", self.store_name, machine.lifecycle.state())));
        }
        let effects = std::mem::take(&mut machine.pending);
        self.drive(&mut machine.lifecycle, effects, None).await
    }

    /// Handle a message posted by the host page.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<LifecycleReport, Error> {
        let mut machine = self.machine.lock().await;
        match message {
            ControlMessage::SkipWaiting => {
                tracing::info!(store = %self.store_name, "skip waiting requested");
                self.dispatch(&mut machine.lifecycle, LifecycleEvent::SkipWaiting).await
            }
        }
    }

    /// The previous instance no longer controls any client.
    pub async fn release_predecessor(&self) -> Result<LifecycleReport, Error> {
        let mut machine = self.machine.lock().await;
        self.dispatch(&mut machine.lifecycle, LifecycleEvent::PredecessorReleased).await
    }

    /// A newer instance took over; stop intercepting.
    pub async fn supersede(&self) -> Result<LifecycleReport, Error> {
        let mut machine = self.machine.lock().await;
        self.dispatch(&mut machine.lifecycle, LifecycleEvent::Superseded).await
    }

    /// Apply an event and every follow-up event its effects produce.
    async fn dispatch(&self, lifecycle: &mut Lifecycle, event: LifecycleEvent) -> Result<LifecycleReport, Error> {
        self.drive(lifecycle, Vec::new(), Some(event)).await
    }

    /// Run `effects`, then keep applying events until the machine settles.
    async fn drive(
        &self, lifecycle: &mut Lifecycle, mut effects: Vec<Effect>, mut next: Option<LifecycleEvent>,
    ) -> Result<LifecycleReport, Error> {
        let mut report = LifecycleReport { state: lifecycle.state(), precache: None, activation: None };

        loop {
            for effect in std::mem::take(&mut effects) {
                match effect {
                    Effect::Precache => {
                        let outcome = self.precache().await;
                        next = Some(LifecycleEvent::InstallFinished(outcome.clone()));
                        report.precache = Some(outcome);
                    }
                    Effect::PurgeStaleStores => {
                        let activation = report.activation.get_or_insert_with(ActivationReport::default);
                        activation.deleted_stores = self.purge_stale_stores().await;
                    }
                    Effect::ClaimClients => {
                        let claimed = self.clients.claim(&self.store_name).await;
                        tracing::info!(store = %self.store_name, claimed, "claimed clients");
                        report.activation.get_or_insert_with(ActivationReport::default).claimed_clients = claimed;
                    }
                }
            }

            if next.is_none() && lifecycle.state() == WorkerState::Activating {
                next = Some(LifecycleEvent::ActivationFinished);
            }
            let Some(event) = next.take() else {
                break;
            };

            let from = lifecycle.state();
            let event_name = event.to_string();
            let transition = lifecycle.apply(event, &self.config.policy)?;
            *lifecycle = transition.lifecycle;
            self.state.send_replace(lifecycle.state());
            effects = transition.effects;

            tracing::info!(
                store = %self.store_name,
                event = %event_name,
                from = %from,
                to = %lifecycle.state(),
                "lifecycle transition"
            );
        }

        report.state = lifecycle.state();
        Ok(report)
    }

    /// Fetch every manifest URL and write them all, or nothing.
    async fn precache(&self) -> PrecacheOutcome {
        if let Err(e) = self.storage.open(&self.store_name).await {
            tracing::warn!(store = %self.store_name, error = %e, "failed to open store");
        }

        let mut entries = Vec::with_capacity(self.config.manifest.len());
        let mut failures = Vec::new();

        for path in self.config.manifest.paths() {
            let url = match resolve(&self.config.origin, path) {
                Ok(url) => url,
                Err(e) => {
                    failures.push(PrecacheFailure { url: path.clone(), reason: e.to_string() });
                    continue;
                }
            };

            let request = CachedRequest::get(url.as_str());
            match self.network.fetch(&request).await {
                Ok(response) if response.is_ok() => entries.push((request, response)),
                Ok(response) => failures.push(PrecacheFailure {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                }),
                Err(e) => failures.push(PrecacheFailure { url: url.to_string(), reason: e.to_string() }),
            }
        }

        if failures.is_empty() {
            let cached = entries.len();
            match self.storage.put_all(&self.store_name, entries).await {
                Ok(()) => {
                    tracing::info!(store = %self.store_name, cached, "precache complete");
                    return PrecacheOutcome::Complete { cached };
                }
                Err(e) => failures.push(PrecacheFailure { url: self.store_name.clone(), reason: e.to_string() }),
            }
        }

        for failure in &failures {
            tracing::warn!(store = %self.store_name, url = %failure.url, reason = %failure.reason, "precache failed");
        }
        PrecacheOutcome::Failed { failures }
    }

    /// Delete every store not named for this version. Best-effort.
    async fn purge_stale_stores(&self) -> Vec<String> {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(store = %self.store_name, error = %e, "failed to list stores");
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|n| self.config.version.is_stale(n)) {
            match self.storage.delete(&name).await {
                Ok(true) => {
                    tracing::info!(store = %name, "deleted stale store");
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(store = %name, error = %e, "failed to delete stale store"),
            }
        }
        deleted
    }

    /// Handle an outgoing request from a controlled page.
    ///
    /// # Errors
    ///
    /// - Non-GET or not yet active: whatever the network returns.
    /// - GET: `Error::CacheMiss` when the network failed and the store has
    ///   no entry, or the store error if the fallback read itself failed.
    pub async fn intercept(&self, request: CachedRequest) -> Result<Intercepted, Error> {
        if !request.is_get() || !self.state().intercepts() {
            let response = self.network.fetch(&request).await?;
            return Ok(Intercepted { response, source: ResponseSource::Network });
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.spawn_write(request, response.clone());
                }
                Ok(Intercepted { response, source: ResponseSource::Network })
            }
            Err(Error::Network(reason)) => {
                tracing::debug!(url = %request.url, error = %reason, "network failed, trying store");
                match self.storage.match_request(&self.store_name, &request).await? {
                    Some(response) => {
                        tracing::debug!(store = %self.store_name, url = %request.url, "served from store");
                        Ok(Intercepted { response, source: ResponseSource::Cache })
                    }
                    None => Err(Error::CacheMiss(format!("{} {}", request.method, request.url))),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Copy a response into the store without holding up the page.
    ///
    /// The write is dropped if the instance stopped being active or its
    /// store was deleted in the meantime.
    fn spawn_write(&self, request: CachedRequest, response: CachedResponse) {
        let storage = Arc::clone(&self.storage);
        let store = self.store_name.clone();
        let state = self.state.subscribe();

        let mut pending = lock(&self.pending_writes);
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            let active = state.borrow().intercepts();
            if !active {
                tracing::debug!(store = %store, url = %request.url, "instance no longer active, dropping write");
                return;
            }
            match storage.put_existing(&store, &request, &response).await {
                Ok(true) => tracing::debug!(store = %store, url = %request.url, "stored response"),
                Ok(false) => tracing::debug!(store = %store, url = %request.url, "store deleted, dropping write"),
                Err(e) => tracing::warn!(store = %store, url = %request.url, error = %e, "cache write failed"),
            }
        });
    }

    /// Wait for background cache writes started so far.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *lock(&self.pending_writes));
        while pending.join_next().await.is_some() {}
    }
}
