//! Host-facing registration: which version is active, which one is waiting,
//! and which open pages each controls.

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::task::TaskTracker;

use offvault_core::{CacheDb, Error, Request, Response, WorkerConfig};

use super::{ServiceWorker, WorkerState};
use crate::fetch::Fetcher;

/// Identifier of an open page.
pub type ClientId = u64;

/// Result of [`Registration::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RegisterOutcome {
    /// This version was already active; nothing was installed.
    AlreadyActive,
    /// Installed, waiting for the previous version's pages to close.
    Waiting,
    /// Installed and activated.
    Activated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatus {
    pub cache_name: String,
    pub state: WorkerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClientStatus {
    pub id: ClientId,
    /// Store name of the controlling version; `None` for an uncontrolled page.
    pub controller: Option<String>,
}

/// Snapshot of the registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub clients: Vec<ClientStatus>,
    pub stores: Vec<String>,
}

#[derive(Default)]
struct Slots {
    active: Option<Arc<ServiceWorker>>,
    waiting: Option<Arc<ServiceWorker>>,
    /// Active store recorded by a previous run, not yet bound to a worker.
    persisted: Option<String>,
    clients: BTreeMap<ClientId, Option<String>>,
    next_client: ClientId,
}

impl Slots {
    fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(ServiceWorker::cache_name)
    }

    /// A waiting version may take over once no page is controlled by the active one.
    fn can_activate(&self) -> bool {
        match self.active_name() {
            Some(active) => !self.clients.values().any(|c| c.as_deref() == Some(active)),
            None => true,
        }
    }
}

struct Inner {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    tracker: TaskTracker,
    slots: RwLock<Slots>,
    /// Serializes install and activation; fetches never take it.
    lifecycle: Mutex<()>,
}

/// Single handle the host uses to drive the worker.
#[derive(Clone)]
pub struct Registration {
    inner: Arc<Inner>,
}

impl Registration {
    /// Open the registration, restoring the active store name from the database.
    pub async fn open(db: CacheDb, fetcher: Arc<dyn Fetcher>, tracker: TaskTracker) -> Result<Self, Error> {
        let persisted = db.active_store().await?;
        if let Some(name) = &persisted {
            tracing::info!(store = %name, "restored active cache store");
        }
        let slots = Slots { persisted, ..Default::default() };
        Ok(Self { inner: Arc::new(Inner { db, fetcher, tracker, slots: RwLock::new(slots), lifecycle: Mutex::new(()) }) })
    }

    pub fn db(&self) -> &CacheDb {
        &self.inner.db
    }

    /// Currently active version, if any.
    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.inner.slots.read().await.active.clone()
    }

    /// Store name of the active version, including one restored from disk
    /// but not yet bound to a worker.
    pub async fn active_store(&self) -> Option<String> {
        let slots = self.inner.slots.read().await;
        slots.active_name().map(str::to_string).or_else(|| slots.persisted.clone())
    }

    /// Install `config` as a new version and activate it when allowed.
    ///
    /// A failed install leaves the active version untouched.
    pub async fn register(&self, config: WorkerConfig) -> Result<RegisterOutcome, Error> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        {
            let slots = self.inner.slots.read().await;
            if slots.active_name() == Some(config.cache_name.as_str()) {
                return Ok(RegisterOutcome::AlreadyActive);
            }
            if slots.waiting.as_deref().map(ServiceWorker::cache_name) == Some(config.cache_name.as_str()) {
                return Ok(RegisterOutcome::Waiting);
            }
        }

        if self.restore(&config).await? {
            return Ok(RegisterOutcome::AlreadyActive);
        }

        let worker = Arc::new(ServiceWorker::new(
            config,
            &self.inner.db,
            self.inner.fetcher.clone(),
            self.inner.tracker.clone(),
        )?);
        worker.install(&self.inner.db).await?;

        let replaced = self.inner.slots.write().await.waiting.replace(worker.clone());
        if let Some(old) = replaced {
            old.transition(WorkerState::Redundant).await?;
        }

        let may_activate = worker.config().skip_waiting || self.inner.slots.read().await.can_activate();
        if may_activate {
            self.activate_waiting().await?;
            Ok(RegisterOutcome::Activated)
        } else {
            tracing::info!(cache = worker.cache_name(), "installed version waiting for clients to close");
            Ok(RegisterOutcome::Waiting)
        }
    }

    /// Bind a store activated by an earlier run to a worker.
    ///
    /// Returns true when that store is the one `config` describes, so no
    /// install is needed.
    async fn restore(&self, config: &WorkerConfig) -> Result<bool, Error> {
        let persisted = {
            let slots = self.inner.slots.read().await;
            if slots.active.is_some() {
                return Ok(false);
            }
            match slots.persisted.clone() {
                Some(name) => name,
                None => return Ok(false),
            }
        };

        if !self.inner.db.has_store(&persisted).await? {
            tracing::warn!(store = %persisted, "persisted active store is missing");
            self.inner.slots.write().await.persisted = None;
            return Ok(false);
        }

        let current = persisted == config.cache_name;
        let worker = ServiceWorker::restored(
            config.with_cache_name(persisted),
            &self.inner.db,
            self.inner.fetcher.clone(),
            self.inner.tracker.clone(),
        )?;
        let mut slots = self.inner.slots.write().await;
        slots.active = Some(Arc::new(worker));
        slots.persisted = None;
        Ok(current)
    }

    /// Activate the waiting version now instead of waiting for pages to close.
    ///
    /// Returns false when nothing is waiting.
    pub async fn skip_waiting(&self) -> Result<bool, Error> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.inner.slots.read().await.waiting.is_none() {
            return Ok(false);
        }
        self.activate_waiting().await?;
        Ok(true)
    }

    /// Caller holds the lifecycle lock.
    async fn activate_waiting(&self) -> Result<(), Error> {
        let (worker, previous) = {
            let slots = self.inner.slots.read().await;
            let worker = slots
                .waiting
                .clone()
                .ok_or_else(|| Error::InvalidState("no waiting worker to activate".into()))?;
            (worker, slots.active.clone())
        };

        worker.transition(WorkerState::Activating).await?;

        if let Err(e) = self.commit_activation(&worker).await {
            tracing::warn!(cache = worker.cache_name(), error = %e, "activation failed");
            worker.transition(WorkerState::Redundant).await?;
            self.inner.slots.write().await.waiting = None;
            return Err(match e {
                Error::ActivationFailed(_) => e,
                other => Error::ActivationFailed(other.to_string()),
            });
        }

        worker.transition(WorkerState::Activated).await?;

        let name = worker.cache_name().to_string();
        let claim = worker.config().clients_claim;
        let claimed = {
            let mut slots = self.inner.slots.write().await;
            slots.active = Some(worker);
            slots.waiting = None;
            slots.persisted = None;
            let mut claimed = 0;
            for controller in slots.clients.values_mut() {
                if controller.is_some() || claim {
                    *controller = Some(name.clone());
                    claimed += 1;
                }
            }
            claimed
        };

        // New fetches now reach the new version; the old one only finishes
        // what was already dispatched to it.
        if let Some(previous) = previous {
            previous.transition(WorkerState::Redundant).await?;
        }
        tracing::info!(cache = %name, clients = claimed, "worker activated");
        Ok(())
    }

    async fn commit_activation(&self, worker: &ServiceWorker) -> Result<(), Error> {
        worker.evict_stale_stores(&self.inner.db).await?;
        self.inner.db.set_active_store(worker.cache_name()).await
    }

    /// Open a page. It is controlled by the active version, if there is one.
    pub async fn attach_client(&self) -> ClientId {
        let mut slots = self.inner.slots.write().await;
        let id = slots.next_client;
        slots.next_client += 1;
        let controller = slots.active_name().map(str::to_string);
        slots.clients.insert(id, controller);
        id
    }

    /// Close a page. Closing the last page of the active version lets a
    /// waiting version activate.
    pub async fn detach_client(&self, id: ClientId) -> Result<(), Error> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let ready = {
            let mut slots = self.inner.slots.write().await;
            if slots.clients.remove(&id).is_none() {
                return Err(Error::InvalidInput(format!("unknown client {id}")));
            }
            slots.waiting.is_some() && slots.can_activate()
        };
        if ready {
            self.activate_waiting().await?;
        }
        Ok(())
    }

    /// Dispatch a fetch to the active version, or straight to the network
    /// when none is active.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        match self.active().await {
            Some(worker) => worker.handle_fetch(request).await,
            None => self.inner.fetcher.fetch(request).await,
        }
    }

    /// Dispatch a fetch issued by an open page. Uncontrolled pages bypass
    /// the worker.
    pub async fn fetch_from(&self, client: ClientId, request: &Request) -> Result<Response, Error> {
        let controlled = {
            let slots = self.inner.slots.read().await;
            match slots.clients.get(&client) {
                Some(controller) => controller.is_some(),
                None => return Err(Error::InvalidInput(format!("unknown client {client}"))),
            }
        };
        if controlled {
            self.fetch(request).await
        } else {
            self.inner.fetcher.fetch(request).await
        }
    }

    /// Wait for every background cache write spawned so far.
    pub async fn flush(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        let (active, waiting, persisted, clients) = {
            let slots = self.inner.slots.read().await;
            let clients = slots
                .clients
                .iter()
                .map(|(id, controller)| ClientStatus { id: *id, controller: controller.clone() })
                .collect::<Vec<_>>();
            (slots.active.clone(), slots.waiting.clone(), slots.persisted.clone(), clients)
        };

        let active = match active {
            Some(worker) => Some(describe(&worker).await),
            None => persisted.map(|cache_name| WorkerStatus { cache_name, state: WorkerState::Activated }),
        };
        let waiting = match waiting {
            Some(worker) => Some(describe(&worker).await),
            None => None,
        };
        let stores = self.inner.db.store_names().await?;

        Ok(RegistrationStatus { active, waiting, clients, stores })
    }
}

async fn describe(worker: &ServiceWorker) -> WorkerStatus {
    WorkerStatus { cache_name: worker.cache_name().to_string(), state: worker.state().await }
}
