//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFVAULT_*)
//! 2. TOML config file (if OFFVAULT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::manifest_digest;
use crate::policy::RouteConfig;

mod validation;
mod worker;

pub use validation::ConfigError;
pub use worker::WorkerConfig;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFVAULT_*)
/// 2. TOML config file (if OFFVAULT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via OFFVAULT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the app is served from; root-relative URLs resolve against it.
    ///
    /// Set via OFFVAULT_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix of every cache store name.
    ///
    /// Set via OFFVAULT_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Deployment generation, embedded in the cache store name.
    ///
    /// Set via OFFVAULT_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: u32,

    /// URLs precached on install, in order.
    ///
    /// Set via OFFVAULT_MANIFEST environment variable (`["/", "/index.html"]`).
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Shell document served when a navigation cannot reach the network.
    ///
    /// Set via OFFVAULT_NAVIGATION_FALLBACK environment variable.
    #[serde(default = "default_navigation_fallback")]
    pub navigation_fallback: Option<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OFFVAULT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OFFVAULT_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via OFFVAULT_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Activate a freshly installed version without waiting for open pages to close.
    ///
    /// Set via OFFVAULT_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Take control of already open pages right after activation.
    ///
    /// Set via OFFVAULT_CLIENTS_CLAIM environment variable.
    #[serde(default = "default_true")]
    pub clients_claim: bool,

    /// Route table, evaluated in order.
    ///
    /// Usually set through `[[routes]]` tables in the TOML file.
    #[serde(default = "RouteConfig::defaults")]
    pub routes: Vec<RouteConfig>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offvault-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_prefix() -> String {
    "offvault".into()
}

fn default_version() -> u32 {
    1
}

fn default_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_navigation_fallback() -> Option<String> {
    Some("/index.html".into())
}

fn default_user_agent() -> String {
    "offvault/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            manifest: default_manifest(),
            navigation_fallback: default_navigation_fallback(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            skip_waiting: true,
            clients_claim: true,
            routes: RouteConfig::defaults(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed app origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme: {scheme}") }),
        }
    }

    /// Versioned cache store name.
    ///
    /// Embeds both the generation and a digest of the manifest, so changing
    /// the manifest always yields a new name even if `version` is not bumped.
    pub fn cache_name(&self) -> String {
        let digest = manifest_digest(&self.manifest);
        format!("{}-v{}-{}", self.cache_prefix, self.version, &digest[..8])
    }

    /// Build the worker configuration for the current deployment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the origin cannot be parsed.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        Ok(WorkerConfig {
            cache_name: self.cache_name(),
            origin: self.origin_url()?,
            manifest: self.manifest.clone(),
            navigation_fallback: self.navigation_fallback.clone(),
            skip_waiting: self.skip_waiting,
            clients_claim: self.clients_claim,
            routes: self.routes.clone(),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFVAULT_`
    /// 2. TOML file from `OFFVAULT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFVAULT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFVAULT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
