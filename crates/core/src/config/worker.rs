//! Per-version worker configuration.

use url::Url;

use crate::policy::RouteConfig;

/// Everything one worker version needs: its store name, what to precache,
/// and how to route requests.
///
/// Two deployments with the same `cache_name` are the same version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub cache_name: String,
    pub origin: Url,
    pub manifest: Vec<String>,
    pub navigation_fallback: Option<String>,
    pub skip_waiting: bool,
    pub clients_claim: bool,
    pub routes: Vec<RouteConfig>,
}

impl WorkerConfig {
    /// Worker config with the default route table and no manifest.
    pub fn new(cache_name: impl Into<String>, origin: Url) -> Self {
        Self {
            cache_name: cache_name.into(),
            origin,
            manifest: Vec::new(),
            navigation_fallback: Some("/index.html".into()),
            skip_waiting: true,
            clients_claim: true,
            routes: RouteConfig::defaults(),
        }
    }

    pub fn with_manifest<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_routes(mut self, routes: Vec<RouteConfig>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    pub fn with_clients_claim(mut self, clients_claim: bool) -> Self {
        self.clients_claim = clients_claim;
        self
    }

    pub fn with_navigation_fallback(mut self, fallback: Option<&str>) -> Self {
        self.navigation_fallback = fallback.map(str::to_string);
        self
    }

    /// Same routing and origin under another store name.
    ///
    /// Used to keep serving a version restored from disk while a new one installs.
    pub fn with_cache_name(&self, cache_name: impl Into<String>) -> Self {
        Self { cache_name: cache_name.into(), ..self.clone() }
    }
}
