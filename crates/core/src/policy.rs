//! Per-resource-class caching policy.
//!
//! A route pairs a matcher (destinations, URL pattern, origin scope) with a
//! resolution strategy and the expiration rules for the entries it writes.
//! Routes are evaluated in order; the first match wins.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::request::Destination;

/// Resolution order for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve from the store; on miss fetch and store.
    CacheFirst,
    /// Fetch; on transport failure serve from the store.
    NetworkFirst,
    /// Serve from the store or fail.
    CacheOnly,
    /// Always fetch, never store.
    NetworkOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
            Self::CacheOnly => "cache-only",
            Self::NetworkOnly => "network-only",
        }
    }
}

/// Which origins a route applies to, relative to the app origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RouteScope {
    SameOrigin,
    CrossOrigin,
    #[default]
    Any,
}

/// Bounds after which entries written by a route become eligible for eviction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Expiration {
    /// Keep at most this many entries for the route; oldest go first.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Entries older than this are treated as misses and purged.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl Expiration {
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age_secs.is_none()
    }
}

/// One resource class and its policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteConfig {
    /// Route name, recorded on every entry the route writes.
    pub name: String,

    /// Destinations this route applies to. Empty matches any destination.
    #[serde(default)]
    pub destinations: Vec<Destination>,

    /// Regular expression tested against the full request URL.
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub scope: RouteScope,

    pub strategy: Strategy,

    #[serde(default)]
    pub expiration: Expiration,

    /// Response statuses eligible for storage. Status 0 is an opaque response.
    #[serde(default = "default_cacheable_statuses")]
    pub cacheable_statuses: Vec<u16>,

    /// Responses with a larger body are served but not stored.
    #[serde(default)]
    pub max_entry_bytes: Option<usize>,
}

fn default_cacheable_statuses() -> Vec<u16> {
    vec![0, 200]
}

const DAY_SECS: u64 = 24 * 60 * 60;

impl RouteConfig {
    /// A route with default expiration and cacheable statuses.
    pub fn new(name: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            destinations: Vec::new(),
            pattern: None,
            scope: RouteScope::Any,
            strategy,
            expiration: Expiration::default(),
            cacheable_statuses: default_cacheable_statuses(),
            max_entry_bytes: None,
        }
    }

    pub fn destinations(mut self, destinations: &[Destination]) -> Self {
        self.destinations = destinations.to_vec();
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn scope(mut self, scope: RouteScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn expiration(mut self, max_entries: Option<usize>, max_age_secs: Option<u64>) -> Self {
        self.expiration = Expiration { max_entries, max_age_secs };
        self
    }

    pub fn max_entry_bytes(mut self, limit: usize) -> Self {
        self.max_entry_bytes = Some(limit);
        self
    }

    /// Whether a response with this status and size may be stored.
    pub fn is_cacheable(&self, status: u16, size: usize) -> bool {
        if !self.cacheable_statuses.contains(&status) {
            return false;
        }
        self.max_entry_bytes.is_none_or(|limit| size <= limit)
    }

    /// Default route table.
    ///
    /// Documents are network-first so a reachable server always wins. Scripts,
    /// styles and manifests are cache-first: they only change on redeploy, and
    /// a redeploy changes the store name. Fonts get their own bounded route so
    /// a few large files cannot crowd out everything else.
    pub fn defaults() -> Vec<RouteConfig> {
        vec![
            RouteConfig::new("pages", Strategy::NetworkFirst)
                .destinations(&[Destination::Document])
                .scope(RouteScope::SameOrigin)
                .expiration(Some(50), None),
            RouteConfig::new("static", Strategy::CacheFirst).destinations(&[
                Destination::Script,
                Destination::Style,
                Destination::Manifest,
            ]),
            RouteConfig::new("fonts", Strategy::CacheFirst)
                .destinations(&[Destination::Font])
                .expiration(Some(30), Some(365 * DAY_SECS))
                .max_entry_bytes(4 * 1024 * 1024),
            RouteConfig::new("images", Strategy::CacheFirst)
                .destinations(&[Destination::Image])
                .expiration(Some(60), Some(30 * DAY_SECS)),
            RouteConfig::new("runtime", Strategy::CacheFirst).scope(RouteScope::SameOrigin),
        ]
    }
}
