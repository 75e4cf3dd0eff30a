//! Request classification: pick the first route whose matcher accepts a request.

use regex::Regex;
use url::Url;

use offvault_core::{Error, Request, RouteConfig, RouteScope};

/// A route with its URL pattern compiled.
#[derive(Debug, Clone)]
pub struct Route {
    config: RouteConfig,
    pattern: Option<Regex>,
}

impl Route {
    pub fn compile(config: RouteConfig) -> Result<Self, Error> {
        let pattern = config
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::InvalidInput(format!("route {}: invalid pattern: {e}", config.name)))?;
        Ok(Self { config, pattern })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Only GET requests are ever routed; everything else goes straight to the network.
    pub fn matches(&self, request: &Request, origin: &Url) -> bool {
        if !request.is_get() {
            return false;
        }
        if !self.config.destinations.is_empty() && !self.config.destinations.contains(&request.destination) {
            return false;
        }
        let same_origin = request.is_same_origin(origin);
        let in_scope = match self.config.scope {
            RouteScope::SameOrigin => same_origin,
            RouteScope::CrossOrigin => !same_origin,
            RouteScope::Any => true,
        };
        in_scope && self.pattern.as_ref().is_none_or(|re| re.is_match(request.url.as_str()))
    }
}

/// Ordered route table for one worker version.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
    origin: Url,
}

impl Router {
    pub fn new(routes: &[RouteConfig], origin: Url) -> Result<Self, Error> {
        let routes = routes.iter().cloned().map(Route::compile).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// First matching route, or `None` for network-only handling.
    pub fn select(&self, request: &Request) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(request, &self.origin))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
