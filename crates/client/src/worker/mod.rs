//! Offline cache worker.
//!
//! One [`ServiceWorker`] exists per deployed version. It precaches the asset
//! manifest on install, evicts every other store on activation, and resolves
//! each intercepted request through the route table while active.
//!
//! ### Lifecycle
//! `parsed -> installing -> installed -> activating -> activated`, with any
//! state able to drop to `redundant`. Transitions are driven by
//! [`Registration`], never by timers.
//!
//! ### Offline fallbacks
//! - Same-origin navigations are always network-first. When the network is
//!   unreachable the shell document is served, then the cached page itself,
//!   then `/`. Cross-origin navigations follow the route table.
//! - A transport failure for the root document (`/` or `/index.html`) is
//!   answered with the cached root whatever route matched.
//! - Anything else surfaces its error.

pub mod registration;
pub mod router;
mod strategy;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use url::Url;

use offvault_core::{CacheDb, Error, Request, Response, WorkerConfig};

pub use registration::{ClientId, ClientStatus, RegisterOutcome, Registration, RegistrationStatus, WorkerStatus};
pub use router::{Route, Router};

use crate::fetch::{Fetcher, canonicalize};
use strategy::CacheHandler;

const ROOT_PATHS: [&str; 2] = ["/", "/index.html"];

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing) | (Installing, Installed) | (Installed, Activating) | (Activating, Activated)
        ) || (next == Redundant && self != Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployed version of the worker.
pub struct ServiceWorker {
    config: WorkerConfig,
    router: Router,
    handler: CacheHandler,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<WorkerState>,
    /// Set once the version has been activated; a redundant version that was
    /// active still answers fetches already dispatched to it.
    served: AtomicBool,
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker").field("cache_name", &self.config.cache_name).finish_non_exhaustive()
    }
}

impl ServiceWorker {
    /// A freshly parsed version, not yet installed.
    pub fn new(
        config: WorkerConfig, db: &CacheDb, fetcher: Arc<dyn Fetcher>, tracker: TaskTracker,
    ) -> Result<Self, Error> {
        Self::with_state(config, db, fetcher, tracker, WorkerState::Parsed)
    }

    /// A version whose activation was persisted by an earlier run.
    pub fn restored(
        config: WorkerConfig, db: &CacheDb, fetcher: Arc<dyn Fetcher>, tracker: TaskTracker,
    ) -> Result<Self, Error> {
        Self::with_state(config, db, fetcher, tracker, WorkerState::Activated)
    }

    fn with_state(
        config: WorkerConfig, db: &CacheDb, fetcher: Arc<dyn Fetcher>, tracker: TaskTracker, state: WorkerState,
    ) -> Result<Self, Error> {
        let router = Router::new(&config.routes, config.origin.clone())?;
        let handler = CacheHandler::new(db.store(&config.cache_name), fetcher.clone(), tracker);
        let served = AtomicBool::new(state == WorkerState::Activated);
        Ok(Self { config, router, handler, fetcher, state: RwLock::new(state), served })
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub(crate) async fn transition(&self, next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let current = *state;
        if !current.can_transition_to(next) {
            return Err(Error::InvalidState(format!("{}: {current} -> {next}", self.config.cache_name)));
        }
        tracing::info!(cache = %self.config.cache_name, from = %current, to = %next, "worker state change");
        *state = next;
        if next == WorkerState::Activated {
            self.served.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Precache every manifest URL, all or nothing.
    ///
    /// Fetches run concurrently and every one must settle with a 2xx or an
    /// opaque response before the store is written. On failure the worker
    /// becomes redundant and no store is created.
    pub async fn install(&self, db: &CacheDb) -> Result<(), Error> {
        self.transition(WorkerState::Installing).await?;

        match self.precache(db).await {
            Ok(count) => {
                tracing::info!(cache = %self.config.cache_name, entries = count, "precache complete");
                self.transition(WorkerState::Installed).await
            }
            Err(e) => {
                tracing::warn!(cache = %self.config.cache_name, error = %e, "install failed");
                self.transition(WorkerState::Redundant).await?;
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    async fn precache(&self, db: &CacheDb) -> Result<usize, Error> {
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(self.config.manifest.len());
        for entry in &self.config.manifest {
            let url = canonicalize(entry, &self.config.origin)?;
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }

        let mut tasks = JoinSet::new();
        for (index, url) in urls.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            tasks.spawn(async move {
                let request = Request::get(url);
                let result = fetcher.fetch(&request).await;
                (index, request, result)
            });
        }

        let mut fetched = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, request, result) = joined.map_err(|e| Error::InstallFailed(format!("precache task: {e}")))?;
            let url = request.url.to_string();
            let response = result.map_err(|e| Error::PrecacheFailed { url: url.clone(), reason: e.to_string() })?;
            if !(response.ok() || response.is_opaque()) {
                return Err(Error::PrecacheFailed { url, reason: format!("status {}", response.status) });
            }
            fetched.push((index, request, response));
        }

        fetched.sort_by_key(|(index, _, _)| *index);
        let entries: Vec<_> = fetched.into_iter().map(|(_, request, response)| (request, response)).collect();
        let count = entries.len();
        db.precache(&self.config.cache_name, entries).await?;
        Ok(count)
    }

    /// Delete every store except this version's, then verify none remain.
    pub(crate) async fn evict_stale_stores(&self, db: &CacheDb) -> Result<Vec<String>, Error> {
        let current = self.cache_name();
        let mut evicted = Vec::new();
        for name in db.store_names().await? {
            if name != current {
                db.delete_store(&name).await?;
                tracing::info!(store = %name, "deleted stale cache store");
                evicted.push(name);
            }
        }

        let remaining = db.store_names().await?;
        if remaining.iter().any(|name| name != current) {
            return Err(Error::ActivationFailed(format!(
                "stale stores remain after eviction: {}",
                remaining.iter().filter(|name| *name != current).cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        if !remaining.iter().any(|name| name == current) {
            return Err(Error::ActivationFailed(format!("current store {current} is missing")));
        }
        Ok(evicted)
    }

    /// Resolve an intercepted request.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, Error> {
        let state = self.state().await;
        let retired = state == WorkerState::Redundant && self.served.load(Ordering::SeqCst);
        if state != WorkerState::Activated && !retired {
            return Err(Error::InvalidState(format!("{} cannot handle fetch while {state}", self.cache_name())));
        }

        let route = self.router.select(request);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            mode = request.mode.as_str(),
            route = route.map(Route::name).unwrap_or("none"),
            "fetch"
        );

        let result = if request.is_navigation() && request.is_same_origin(&self.config.origin) {
            self.navigate(route, request).await
        } else {
            match route {
                Some(route) => self.handler.resolve(route, request).await,
                None => self.handler.fetcher().fetch(request).await,
            }
        };

        match result {
            Err(err) if err.is_network() && self.is_root_document(request) => {
                match self.cached_root().await {
                    Some(root) => {
                        tracing::info!(url = %request.url, "served cached root document");
                        Ok(root)
                    }
                    None => Err(err),
                }
            }
            other => other,
        }
    }

    async fn navigate(&self, route: Option<&Route>, request: &Request) -> Result<Response, Error> {
        match self.handler.fetcher().fetch(request).await {
            Ok(response) => {
                if let Some(route) = route {
                    self.handler.store_in_background(route, request, &response);
                }
                Ok(response)
            }
            Err(err) if err.is_network() => match self.cached_shell(request).await {
                Some(shell) => {
                    tracing::info!(url = %request.url, "offline navigation served from cache");
                    Ok(shell)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Shell document, else the cached page, else the cached root.
    async fn cached_shell(&self, request: &Request) -> Option<Response> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(url) = self.config.navigation_fallback.as_deref().and_then(|path| self.resolve(path)) {
            candidates.push(url);
        }
        candidates.push(request.url.clone());
        candidates.extend(self.resolve("/"));

        for url in candidates {
            if let Some(hit) = self.handler.lookup(&Request::get(url), None).await {
                return Some(hit);
            }
        }
        None
    }

    async fn cached_root(&self) -> Option<Response> {
        for path in ROOT_PATHS {
            if let Some(url) = self.resolve(path)
                && let Some(hit) = self.handler.lookup(&Request::get(url), None).await
            {
                return Some(hit);
            }
        }
        None
    }

    fn is_root_document(&self, request: &Request) -> bool {
        request.is_get() && request.is_same_origin(&self.config.origin) && ROOT_PATHS.contains(&request.url.path())
    }

    fn resolve(&self, path: &str) -> Option<Url> {
        canonicalize(path, &self.config.origin).ok()
    }
}
