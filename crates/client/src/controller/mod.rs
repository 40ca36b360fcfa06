//! Offline cache controller.
//!
//! ### Lifecycle
//! - `install`: fetch every critical asset and store them in one batch under
//!   the current version's store. Any failure leaves storage untouched.
//! - `activate`: delete every store but the current one, claim the scope.
//! - `start`: install, then activate, or wait while another version governs
//!   the scope and skip-waiting was not signalled.
//! - `resume`: become active again without reinstalling when this version
//!   already governs the scope and its store is populated.
//! - `launch`: resume or start; if install fails, keep the version that
//!   already governs the scope serving.
//!
//! ### Routing (active only)
//! - Non-GET and non-http(s) requests are not intercepted.
//! - Bypass-listed hosts go straight to the network and are never stored.
//! - Everything else is network first: `200` responses are written back in
//!   the background; on network failure the stored copy is served, then the
//!   offline page for navigations, then a synthetic `503`.
//!
//! ### Control messages
//! - `force-activate` skips waiting; `purge-cache` deletes the current store.

pub mod events;
pub mod lifecycle;
pub mod message;
pub mod policy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitecache_core::{AppConfig, CacheStorage, Error, Response};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{Network, Request};

pub use events::ControllerEvent;
pub use lifecycle::LifecycleState;
pub use message::{ControlMessage, UnknownMessage};
pub use policy::{Action, RoutePolicy, decide};

const EVENT_CAPACITY: usize = 32;

/// Everything a controller needs to know about the site it governs.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Store name prefix and registration scope.
    pub cache_prefix: String,
    /// Version tag embedded in the store name.
    pub version: String,
    /// Origin the controller governs.
    pub origin: Url,
    /// Critical assets, resolved against the origin, in install order.
    pub manifest: Vec<Url>,
    /// Page served for failed navigations. Part of `manifest`.
    pub offline_page: Url,
    /// Hosts that are never cached.
    pub bypass_hosts: Vec<String>,
    /// Skip waiting as soon as install succeeds.
    pub skip_waiting_on_install: bool,
}

impl ControllerSettings {
    /// Resolve the configured paths against the configured origin.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let resolve = |path: &str| {
            origin
                .join(path)
                .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
        };

        Ok(Self {
            cache_prefix: config.cache_prefix.clone(),
            version: config.version.clone(),
            origin: origin.clone(),
            manifest: config
                .critical_assets
                .iter()
                .map(|p| resolve(p))
                .collect::<Result<_, _>>()?,
            offline_page: resolve(&config.offline_page)?,
            bypass_hosts: config.bypass_hosts.clone(),
            skip_waiting_on_install: config.skip_waiting_on_install,
        })
    }

    /// `{prefix}-{version}`.
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }
}

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflinePage,
    Synthetic,
}

/// Result of handing a request to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The controller stayed out of it; the host performs the request.
    NotIntercepted,
    /// The controller answered.
    Responded { response: Response, source: ResponseSource },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Responded { response, .. } => Some(response),
            FetchOutcome::NotIntercepted => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Responded { source, .. } => Some(*source),
            FetchOutcome::NotIntercepted => None,
        }
    }
}

/// Diagnostic snapshot of a controller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerStatus {
    pub version: String,
    pub store_name: String,
    pub state: LifecycleState,
    /// Entries in the current store.
    pub entry_count: u64,
    /// Every store present in storage.
    pub stores: Vec<String>,
}

/// Versioned, network-first cache controller for one origin.
pub struct CacheController<N, S> {
    settings: ControllerSettings,
    store_name: String,
    policy: RoutePolicy,
    network: Arc<N>,
    storage: Arc<S>,
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
    writes: Mutex<JoinSet<()>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl<N, S> CacheController<N, S>
where
    N: Network + 'static,
    S: CacheStorage + 'static,
{
    pub fn new(settings: ControllerSettings, network: Arc<N>, storage: Arc<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store_name: settings.store_name(),
            policy: RoutePolicy::new(&settings.bypass_hosts),
            settings,
            network,
            storage,
            state: RwLock::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
            writes: Mutex::new(JoinSet::new()),
            events,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Network the controller forwards to; hosts use it for requests the
    /// controller does not intercept.
    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// Receive lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ControllerEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    async fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        tracing::debug!("controller {} {} -> {}", self.settings.version, *state, next);
        *state = next;
    }

    /// Install, then activate or wait.
    ///
    /// Returns the state the controller settled in.
    pub async fn start(&self) -> Result<LifecycleState, Error> {
        self.install().await?;

        let governing = self.storage.active_version(&self.settings.cache_prefix).await?;
        let other_active = governing.as_deref().is_some_and(|v| v != self.settings.version);

        if other_active && !self.skip_waiting.load(Ordering::SeqCst) {
            tracing::info!(
                version = %self.settings.version,
                active = governing.as_deref().unwrap_or_default(),
                "another version governs the scope; waiting"
            );
            self.set_state(LifecycleState::Waiting).await;
            self.emit(ControllerEvent::Waiting { version: self.settings.version.clone() });

            // A force-activate may have landed between the check and the transition.
            if self.skip_waiting.load(Ordering::SeqCst) {
                self.activate().await?;
            }
        } else {
            self.activate().await?;
        }

        Ok(self.state().await)
    }

    /// Take control again without reinstalling, if this version was
    /// already active and its store survived.
    ///
    /// Returns false (leaving the state untouched) when a full `start` is
    /// needed.
    pub async fn resume(&self) -> Result<bool, Error> {
        if self.state().await != LifecycleState::Parsed {
            return Ok(false);
        }

        let governing = self.storage.active_version(&self.settings.cache_prefix).await?;
        if governing.as_deref() != Some(self.settings.version.as_str()) {
            return Ok(false);
        }
        if self.storage.entry_count(&self.store_name).await? == 0 {
            return Ok(false);
        }

        self.set_state(LifecycleState::Active).await;
        tracing::info!("resumed {} without reinstalling", self.store_name);
        Ok(true)
    }

    /// Bring a controller up the way a host process should on boot.
    ///
    /// Resumes this version when it already governs the scope, otherwise
    /// starts it. If install fails while another version governs the scope
    /// with a populated store, a controller for that version is resumed and
    /// returned instead so its store keeps serving. With nothing to fall
    /// back to, the failed controller is returned in the `redundant` state.
    ///
    /// # Errors
    ///
    /// Storage failures, and start errors other than a failed install.
    pub async fn launch(settings: ControllerSettings, network: Arc<N>, storage: Arc<S>) -> Result<Self, Error> {
        let controller = Self::new(settings, Arc::clone(&network), Arc::clone(&storage));
        if controller.resume().await? {
            return Ok(controller);
        }

        let started = controller.start().await;
        let reason = match started {
            Ok(_) => return Ok(controller),
            Err(Error::InstallFailed(reason)) => reason,
            Err(e) => return Err(e),
        };

        let governing = storage.active_version(&controller.settings.cache_prefix).await?;
        let Some(version) = governing.filter(|v| *v != controller.settings.version) else {
            tracing::warn!("{} not installed and no prior version to serve: {reason}", controller.store_name);
            return Ok(controller);
        };

        let prior = Self::new(ControllerSettings { version, ..controller.settings.clone() }, network, storage);
        if prior.resume().await? {
            tracing::warn!("{} not installed; {} keeps serving", controller.store_name, prior.store_name);
            Ok(prior)
        } else {
            tracing::warn!("{} not installed and {} has nothing stored", controller.store_name, prior.store_name);
            Ok(controller)
        }
    }

    /// Fetch every critical asset and store them under the current store.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if any asset is unreachable, answers
    /// with a non-2xx status, or the batch cannot be written. Nothing is
    /// stored in that case and the controller becomes redundant.
    pub async fn install(&self) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if !state.can_install() {
                return Err(Error::InvalidState(format!("cannot install while {}", *state)));
            }
            *state = LifecycleState::Installing;
        }

        tracing::info!("installing {} ({} critical assets)", self.store_name, self.settings.manifest.len());

        let mut fetches = JoinSet::new();
        for (idx, url) in self.settings.manifest.iter().enumerate() {
            let network = Arc::clone(&self.network);
            let request = Request::get(url.clone());
            fetches.spawn(async move { (idx, network.fetch(&request).await) });
        }

        let mut fetched = Vec::with_capacity(self.settings.manifest.len());
        while let Some(joined) = fetches.join_next().await {
            let (idx, result) = match joined {
                Ok(pair) => pair,
                Err(e) => return self.fail_install(format!("asset fetch task failed: {e}")).await,
            };
            let url = &self.settings.manifest[idx];
            match result {
                Ok(response) if response.is_ok() => fetched.push((idx, url.to_string(), response)),
                Ok(response) => return self.fail_install(format!("{url}: status {}", response.status)).await,
                Err(e) => return self.fail_install(format!("{url}: {e}")).await,
            }
        }

        fetched.sort_by_key(|(idx, _, _)| *idx);
        let entries = fetched.into_iter().map(|(_, url, resp)| (url, resp)).collect();

        if let Err(e) = self.storage.put_all(&self.store_name, entries).await {
            return self.fail_install(format!("storing critical assets: {e}")).await;
        }

        if self.settings.skip_waiting_on_install {
            self.skip_waiting.store(true, Ordering::SeqCst);
        }

        self.set_state(LifecycleState::Installed).await;
        tracing::info!("installed {}", self.store_name);
        self.emit(ControllerEvent::Installed { version: self.settings.version.clone() });
        Ok(())
    }

    async fn fail_install(&self, reason: String) -> Result<(), Error> {
        tracing::error!(version = %self.settings.version, "install failed: {reason}");
        self.set_state(LifecycleState::Redundant).await;
        self.emit(ControllerEvent::InstallFailed { version: self.settings.version.clone(), reason: reason.clone() });
        Err(Error::InstallFailed(reason))
    }

    /// Delete stale stores and take control of the scope.
    ///
    /// Cleanup is best-effort: a store that fails to delete is logged and
    /// left behind. Calling this on an active or activating controller is
    /// a no-op.
    pub async fn activate(&self) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if matches!(*state, LifecycleState::Active | LifecycleState::Activating) {
                return Ok(());
            }
            if !state.can_activate() {
                return Err(Error::InvalidState(format!("cannot activate while {}", *state)));
            }
            *state = LifecycleState::Activating;
        }

        tracing::info!("activating {}", self.store_name);

        match self.storage.store_names().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| *n != self.store_name) {
                    match self.storage.delete_store(&name).await {
                        Ok(_) => {
                            tracing::info!("deleted stale store {name}");
                            self.emit(ControllerEvent::StaleStoreDeleted { name });
                        }
                        Err(e) => tracing::warn!("failed to delete stale store {name}: {e}"),
                    }
                }
            }
            Err(e) => tracing::warn!("could not list stores for cleanup: {e}"),
        }

        if let Err(e) = self
            .storage
            .set_active_version(&self.settings.cache_prefix, &self.settings.version)
            .await
        {
            tracing::warn!("failed to record active version: {e}");
        }

        self.set_state(LifecycleState::Active).await;
        tracing::info!("controller {} active", self.settings.version);
        self.emit(ControllerEvent::ControllerChanged { version: self.settings.version.clone() });
        Ok(())
    }

    /// Route one request.
    ///
    /// # Errors
    ///
    /// Only a bypass-listed request can fail, with the network error it
    /// produced. Routed requests always resolve.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if !self.state().await.can_intercept_fetch() {
            return Ok(FetchOutcome::NotIntercepted);
        }

        let action = decide(request, &self.policy);
        tracing::debug!("{} {} -> {:?}", request.method, request.url, action);

        match action {
            Action::PassThrough => Ok(FetchOutcome::NotIntercepted),
            Action::BypassCache => {
                let response = self.network.fetch(request).await?;
                Ok(FetchOutcome::Responded { response, source: ResponseSource::Network })
            }
            Action::NetworkFirst => {
                let (response, source) = self.network_first(request).await;
                Ok(FetchOutcome::Responded { response, source })
            }
        }
    }

    async fn network_first(&self, request: &Request) -> (Response, ResponseSource) {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.spawn_write(request.cache_key().to_string(), response.clone());
                }
                (response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!("network failed for {}: {e}; trying cache", request.url);
                self.fallback(request).await
            }
        }
    }

    async fn fallback(&self, request: &Request) -> (Response, ResponseSource) {
        match self.storage.match_entry(&self.store_name, request.cache_key()).await {
            Ok(Some(stored)) => return (stored, ResponseSource::Cache),
            Ok(None) => {}
            Err(e) => tracing::warn!("cache lookup failed for {}: {e}", request.url),
        }

        if request.is_navigation() {
            let offline = self.settings.offline_page.as_str();
            match self.storage.match_entry(&self.store_name, offline).await {
                Ok(Some(page)) => return (page, ResponseSource::OfflinePage),
                Ok(None) => tracing::warn!("offline page {offline} missing from {}", self.store_name),
                Err(e) => tracing::warn!("offline page lookup failed: {e}"),
            }
        }

        (Response::unavailable(), ResponseSource::Synthetic)
    }

    /// Write a response back without holding up the caller.
    fn spawn_write(&self, url: String, response: Response) {
        let storage = Arc::clone(&self.storage);
        let store = self.store_name.clone();

        let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            if let Err(e) = storage.put_entry(&store, &url, &response).await {
                tracing::warn!("cache put failed for {url}: {e}");
            }
        });
    }

    /// Wait for every background cache write started so far.
    pub async fn settle(&self) {
        let mut pending = {
            let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *writes)
        };
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("cache write task failed: {e}");
            }
        }
    }

    /// Apply a control message.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<(), Error> {
        tracing::info!("received {message} message");
        match message {
            ControlMessage::ForceActivate => self.skip_waiting().await,
            ControlMessage::PurgeCache => self.purge().await.map(|_| ()),
        }
    }

    /// Apply a raw JSON message. Returns false if it was not recognized.
    pub async fn handle_message_json(&self, value: &serde_json::Value) -> Result<bool, Error> {
        match ControlMessage::from_value(value) {
            Some(message) => self.handle_message(message).await.map(|_| true),
            None => {
                tracing::debug!("ignoring unrecognized message: {value}");
                Ok(false)
            }
        }
    }

    async fn skip_waiting(&self) -> Result<(), Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state().await == LifecycleState::Waiting {
            self.activate().await?;
        }
        Ok(())
    }

    /// Delete the current store. It is recreated by the next stored write.
    ///
    /// Returns false if there was nothing to delete.
    pub async fn purge(&self) -> Result<bool, Error> {
        let deleted = self.storage.delete_store(&self.store_name).await?;
        tracing::info!("cache {} cleared (existed: {deleted})", self.store_name);
        self.emit(ControllerEvent::CacheCleared { name: self.store_name.clone() });
        Ok(deleted)
    }

    pub async fn status(&self) -> Result<ControllerStatus, Error> {
        Ok(ControllerStatus {
            version: self.settings.version.clone(),
            store_name: self.store_name.clone(),
            state: self.state().await,
            entry_count: self.storage.entry_count(&self.store_name).await?,
            stores: self.storage.store_names().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Destination, NetworkError};
    use reqwest::Method;
    use serde_json::json;
    use sitecache_core::CacheDb;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicUsize;

    const ORIGIN: &str = "https://cloudycode.dev";

    /// Network stub answering from a route table.
    #[derive(Default)]
    struct FakeNetwork {
        routes: Mutex<HashMap<String, Response>>,
        failing: Mutex<HashSet<String>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeNetwork {
        fn with_site() -> Self {
            let net = Self::default();
            net.route("/", 200, "<h1>home</h1>");
            net.route("/offline.html", 200, "<h1>offline</h1>");
            net.route("/css/main.css", 200, "body{}");
            net
        }

        fn route(&self, path: &str, status: u16, body: &str) {
            let response = Response::new(status, body.to_string())
                .with_header("Content-Type", "text/html")
                .with_status_text(if status == 200 { "OK" } else { "" });
            self.routes.lock().unwrap().insert(url(path).to_string(), response);
        }

        fn fail(&self, path: &str) {
            self.failing.lock().unwrap().insert(url(path).to_string());
        }

        fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = request.url.to_string();
            if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&key) {
                return Err(NetworkError::Connect("offline".into()));
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Response::new(404, "not found")))
        }
    }

    /// Storage whose single-entry writes always fail.
    struct ReadOnlyStorage(CacheDb);

    #[async_trait::async_trait]
    impl CacheStorage for ReadOnlyStorage {
        async fn store_names(&self) -> Result<Vec<String>, Error> {
            CacheStorage::store_names(&self.0).await
        }
        async fn has_store(&self, name: &str) -> Result<bool, Error> {
            CacheStorage::has_store(&self.0, name).await
        }
        async fn delete_store(&self, name: &str) -> Result<bool, Error> {
            CacheStorage::delete_store(&self.0, name).await
        }
        async fn match_entry(&self, store: &str, url: &str) -> Result<Option<Response>, Error> {
            self.0.match_entry(store, url).await
        }
        async fn put_entry(&self, _store: &str, _url: &str, _response: &Response) -> Result<(), Error> {
            Err(Error::InvalidInput("quota exceeded".into()))
        }
        async fn put_all(&self, store: &str, entries: Vec<(String, Response)>) -> Result<(), Error> {
            self.0.put_all(store, entries).await
        }
        async fn entry_count(&self, store: &str) -> Result<u64, Error> {
            CacheStorage::entry_count(&self.0, store).await
        }
        async fn active_version(&self, scope: &str) -> Result<Option<String>, Error> {
            self.0.active_version(scope).await
        }
        async fn set_active_version(&self, scope: &str, version: &str) -> Result<(), Error> {
            self.0.set_active_version(scope, version).await
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn settings(version: &str) -> ControllerSettings {
        let config = AppConfig {
            origin: ORIGIN.into(),
            cache_prefix: "site".into(),
            version: version.into(),
            critical_assets: vec!["/".into(), "/offline.html".into(), "/css/main.css".into()],
            ..Default::default()
        };
        ControllerSettings::from_config(&config).unwrap()
    }

    async fn controller_with(
        settings: ControllerSettings, network: FakeNetwork,
    ) -> (CacheController<FakeNetwork, CacheDb>, Arc<FakeNetwork>, Arc<CacheDb>) {
        let network = Arc::new(network);
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let controller = CacheController::new(settings, Arc::clone(&network), Arc::clone(&db));
        (controller, network, db)
    }

    async fn active_controller() -> (CacheController<FakeNetwork, CacheDb>, Arc<FakeNetwork>, Arc<CacheDb>) {
        let (controller, network, db) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        assert_eq!(controller.start().await.unwrap(), LifecycleState::Active);
        (controller, network, db)
    }

    fn responded(outcome: FetchOutcome) -> (Response, ResponseSource) {
        match outcome {
            FetchOutcome::Responded { response, source } => (response, source),
            FetchOutcome::NotIntercepted => panic!("expected a response"),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let settings = settings("v2");
        assert_eq!(settings.store_name(), "site-v2");
        assert_eq!(settings.manifest[0].as_str(), "https://cloudycode.dev/");
        assert_eq!(settings.offline_page.as_str(), "https://cloudycode.dev/offline.html");
        assert!(settings.skip_waiting_on_install);
    }

    #[tokio::test]
    async fn test_install_stores_every_asset() {
        let (controller, _, db) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        controller.install().await.unwrap();

        assert_eq!(controller.state().await, LifecycleState::Installed);
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 3);
        assert_eq!(
            db.entry_urls("site-v2").await.unwrap(),
            vec![
                "https://cloudycode.dev/",
                "https://cloudycode.dev/offline.html",
                "https://cloudycode.dev/css/main.css"
            ]
        );
    }

    #[tokio::test]
    async fn test_install_fails_without_partial_store() {
        let network = FakeNetwork::with_site();
        network.fail("/css/main.css");
        let (controller, _, db) = controller_with(settings("v2"), network).await;
        db.put_entry("site-v1", url("/").as_str(), &Response::new(200, "old"))
            .await
            .unwrap();
        db.set_registration("site", "v1").await.unwrap();

        let result = controller.start().await;

        assert!(matches!(result, Err(Error::InstallFailed(msg)) if msg.contains("main.css")));
        assert_eq!(controller.state().await, LifecycleState::Redundant);
        assert!(!db.has_store("site-v2").await.unwrap());
        assert!(db.has_store("site-v1").await.unwrap());
        assert_eq!(db.registration("site").await.unwrap().unwrap().active_version, "v1");
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let network = FakeNetwork::with_site();
        network.route("/css/main.css", 404, "missing");
        let (controller, _, db) = controller_with(settings("v2"), network).await;

        let result = controller.install().await;

        assert!(matches!(result, Err(Error::InstallFailed(msg)) if msg.contains("404")));
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redundant_controller_does_not_intercept() {
        let network = FakeNetwork::with_site();
        network.fail("/");
        let (controller, network, _) = controller_with(settings("v2"), network).await;
        assert!(controller.start().await.is_err());

        let calls = network.calls();
        let outcome = controller.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotIntercepted);
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_resume_after_restart() {
        let (first, _, db) = active_controller().await;
        drop(first);

        let network = Arc::new(FakeNetwork::with_site());
        let second = CacheController::new(settings("v2"), Arc::clone(&network), Arc::clone(&db));
        assert!(second.resume().await.unwrap());
        assert_eq!(second.state().await, LifecycleState::Active);
        assert_eq!(network.calls(), 0);

        let third = CacheController::new(settings("v3"), network, db);
        assert!(!third.resume().await.unwrap());
        assert_eq!(third.state().await, LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_resume_after_purge_needs_start() {
        let (first, network, db) = active_controller().await;
        first.purge().await.unwrap();

        let second = CacheController::new(settings("v2"), network, db);
        assert!(!second.resume().await.unwrap());
        assert_eq!(second.start().await.unwrap(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_launch_offline_restart_serves_cache() {
        let (first, _, db) = active_controller().await;
        drop(first);

        let network = Arc::new(FakeNetwork::with_site());
        network.go_offline();
        let controller = CacheController::launch(settings("v2"), Arc::clone(&network), Arc::clone(&db))
            .await
            .unwrap();

        assert_eq!(controller.state().await, LifecycleState::Active);
        let request = Request::get(url("/css/main.css")).with_destination(Destination::Style);
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.text(), "body{}");
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_launch_keeps_prior_version_serving() {
        let (prior, network, db) = controller_with(settings("v1"), FakeNetwork::with_site()).await;
        prior.start().await.unwrap();
        drop(prior);

        network.fail("/css/main.css");
        let controller = CacheController::launch(settings("v2"), Arc::clone(&network), Arc::clone(&db))
            .await
            .unwrap();

        assert_eq!(controller.settings().version, "v1");
        assert_eq!(controller.state().await, LifecycleState::Active);
        assert!(!db.has_store("site-v2").await.unwrap());
        assert_eq!(db.registration("site").await.unwrap().unwrap().active_version, "v1");

        network.go_offline();
        let (response, source) = responded(controller.handle_fetch(&Request::navigate(url("/"))).await.unwrap());
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.text(), "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_launch_without_fallback_is_redundant() {
        let network = FakeNetwork::with_site();
        network.go_offline();
        let (_, network, db) = controller_with(settings("v2"), network).await;

        let controller = CacheController::launch(settings("v2"), network, db).await.unwrap();

        assert_eq!(controller.state().await, LifecycleState::Redundant);
        let outcome = controller.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotIntercepted);
    }

    #[tokio::test]
    async fn test_activate_while_activating_is_noop() {
        let (controller, _, _) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        *controller.state.write().await = LifecycleState::Activating;

        assert!(controller.activate().await.is_ok());
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let (controller, _, _) = active_controller().await;
        assert!(matches!(controller.install().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_deletes_only_stale_stores() {
        let (controller, _, db) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        for old in ["site-v0", "site-v1", "unrelated-v9"] {
            db.put_entry(old, url("/").as_str(), &Response::new(200, old))
                .await
                .unwrap();
        }

        controller.start().await.unwrap();

        assert_eq!(db.store_names().await.unwrap(), vec!["site-v2"]);
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 3);
        assert_eq!(db.registration("site").await.unwrap().unwrap().active_version, "v2");
    }

    #[tokio::test]
    async fn test_waits_while_other_version_governs() {
        let mut settings = settings("v2");
        settings.skip_waiting_on_install = false;
        let (controller, network, db) = controller_with(settings, FakeNetwork::with_site()).await;
        db.put_entry("site-v1", url("/").as_str(), &Response::new(200, "old"))
            .await
            .unwrap();
        db.set_registration("site", "v1").await.unwrap();

        assert_eq!(controller.start().await.unwrap(), LifecycleState::Waiting);
        assert!(db.has_store("site-v1").await.unwrap());

        let calls = network.calls();
        let outcome = controller.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotIntercepted);
        assert_eq!(network.calls(), calls);

        controller.handle_message(ControlMessage::ForceActivate).await.unwrap();

        assert_eq!(controller.state().await, LifecycleState::Active);
        assert!(!db.has_store("site-v1").await.unwrap());
        assert_eq!(db.registration("site").await.unwrap().unwrap().active_version, "v2");
    }

    #[tokio::test]
    async fn test_skip_waiting_on_install_takes_over() {
        let (controller, _, db) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        db.set_registration("site", "v1").await.unwrap();

        assert_eq!(controller.start().await.unwrap(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_same_version_restart_does_not_wait() {
        let mut settings = settings("v2");
        settings.skip_waiting_on_install = false;
        let (controller, _, db) = controller_with(settings, FakeNetwork::with_site()).await;
        db.set_registration("site", "v2").await.unwrap();

        assert_eq!(controller.start().await.unwrap(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_force_activate_before_start_skips_waiting() {
        let mut settings = settings("v2");
        settings.skip_waiting_on_install = false;
        let (controller, _, db) = controller_with(settings, FakeNetwork::with_site()).await;
        db.set_registration("site", "v1").await.unwrap();

        controller.handle_message(ControlMessage::ForceActivate).await.unwrap();
        assert_eq!(controller.state().await, LifecycleState::Parsed);
        assert_eq!(controller.start().await.unwrap(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_fetch_before_start_not_intercepted() {
        let (controller, network, _) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        let outcome = controller.handle_fetch(&Request::get(url("/css/main.css"))).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotIntercepted);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_get_not_intercepted() {
        let (controller, network, _) = active_controller().await;
        let calls = network.calls();

        let request = Request::get(url("/contact")).with_method(Method::POST);
        let outcome = controller.handle_fetch(&request).await.unwrap();

        assert_eq!(outcome, FetchOutcome::NotIntercepted);
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_bypass_host_never_stored() {
        let (controller, network, db) = active_controller().await;
        let font = Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap();
        network
            .routes
            .lock()
            .unwrap()
            .insert(font.to_string(), Response::new(200, "woff2"));

        let (response, source) = responded(controller.handle_fetch(&Request::get(font.clone())).await.unwrap());
        controller.settle().await;

        assert_eq!(response.text(), "woff2");
        assert_eq!(source, ResponseSource::Network);
        assert!(db.get_entry("site-v2", font.as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bypass_host_failure_propagates() {
        let (controller, network, _) = active_controller().await;
        network.go_offline();

        let request = Request::get(Url::parse("https://cdn.jsdelivr.net/npm/aos.js").unwrap());
        let result = controller.handle_fetch(&request).await;

        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_success_is_written_back() {
        let (controller, network, db) = active_controller().await;
        network.route("/js/projects.js", 200, "export const projects = [];");

        let request = Request::get(url("/js/projects.js")).with_destination(Destination::Script);
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());
        assert_eq!(source, ResponseSource::Network);

        controller.settle().await;
        let stored = db
            .get_entry("site-v2", request.cache_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.response.status, response.status);
        assert_eq!(stored.response.body, response.body);
    }

    #[tokio::test]
    async fn test_non_200_not_written_back() {
        let (controller, _, db) = active_controller().await;

        let request = Request::get(url("/missing.png"));
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());
        controller.settle().await;

        assert_eq!(response.status, 404);
        assert_eq!(source, ResponseSource::Network);
        assert!(db.get_entry("site-v2", request.cache_key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_serves_cached_copy() {
        let (controller, network, _) = active_controller().await;
        network.go_offline();

        let request = Request::get(url("/css/main.css")).with_destination(Destination::Style);
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());

        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.text(), "body{}");
    }

    #[tokio::test]
    async fn test_offline_serves_previously_fetched_copy() {
        let (controller, network, _) = active_controller().await;
        network.route("/projects", 200, "<h1>projects</h1>");
        let request = Request::navigate(url("/projects"));
        controller.handle_fetch(&request).await.unwrap();
        controller.settle().await;

        network.go_offline();
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());

        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.text(), "<h1>projects</h1>");
    }

    #[tokio::test]
    async fn test_offline_uncached_document_gets_offline_page() {
        let (controller, network, _) = active_controller().await;
        network.go_offline();

        let (response, source) =
            responded(controller.handle_fetch(&Request::navigate(url("/blog"))).await.unwrap());

        assert_eq!(source, ResponseSource::OfflinePage);
        assert_eq!(response.text(), "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_offline_uncached_subresource_gets_503() {
        let (controller, network, _) = active_controller().await;
        network.go_offline();

        let request = Request::get(url("/images/new.webp")).with_destination(Destination::Image);
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());

        assert_eq!(source, ResponseSource::Synthetic);
        assert_eq!(response.status, 503);
        assert_eq!(response.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_offline_document_after_purge_gets_503() {
        let (controller, network, _) = active_controller().await;
        controller.purge().await.unwrap();
        network.go_offline();

        let (response, source) = responded(controller.handle_fetch(&Request::navigate(url("/"))).await.unwrap());

        assert_eq!(source, ResponseSource::Synthetic);
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let network = Arc::new(FakeNetwork::with_site());
        network.route("/js/ui.js", 200, "ui");
        let storage = Arc::new(ReadOnlyStorage(CacheDb::open_in_memory().await.unwrap()));
        let controller = CacheController::new(settings("v2"), Arc::clone(&network), Arc::clone(&storage));
        controller.start().await.unwrap();

        let request = Request::get(url("/js/ui.js"));
        let (response, source) = responded(controller.handle_fetch(&request).await.unwrap());
        controller.settle().await;

        assert_eq!(response.text(), "ui");
        assert_eq!(source, ResponseSource::Network);
        assert!(storage.match_entry("site-v2", request.cache_key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_empties_store_until_next_write() {
        let (controller, network, db) = active_controller().await;

        let handled = controller
            .handle_message_json(&json!({"type": "purge-cache"}))
            .await
            .unwrap();

        assert!(handled);
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 0);
        assert!(!db.has_store("site-v2").await.unwrap());

        network.route("/about", 200, "about");
        controller.handle_fetch(&Request::navigate(url("/about"))).await.unwrap();
        controller.settle().await;

        assert!(db.has_store("site-v2").await.unwrap());
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let (controller, _, db) = active_controller().await;
        let handled = controller.handle_message_json(&json!({"type": "reload"})).await.unwrap();
        assert!(!handled);
        assert_eq!(db.entry_count("site-v2").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let (controller, _, db) = controller_with(settings("v2"), FakeNetwork::with_site()).await;
        db.put_entry("site-v1", url("/").as_str(), &Response::new(200, "old"))
            .await
            .unwrap();
        let mut events = controller.subscribe();

        controller.start().await.unwrap();
        controller.purge().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), ControllerEvent::Installed { version: "v2".into() });
        assert_eq!(events.recv().await.unwrap(), ControllerEvent::StaleStoreDeleted { name: "site-v1".into() });
        assert_eq!(events.recv().await.unwrap(), ControllerEvent::ControllerChanged { version: "v2".into() });
        assert_eq!(events.recv().await.unwrap(), ControllerEvent::CacheCleared { name: "site-v2".into() });
    }

    #[tokio::test]
    async fn test_status() {
        let (controller, _, _) = active_controller().await;
        let status = controller.status().await.unwrap();
        assert_eq!(status.version, "v2");
        assert_eq!(status.store_name, "site-v2");
        assert_eq!(status.state, LifecycleState::Active);
        assert_eq!(status.entry_count, 3);
        assert_eq!(status.stores, vec!["site-v2"]);
    }
}
