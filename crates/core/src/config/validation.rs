//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use crate::policy::Strategy;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `cache_prefix` is empty
    /// - `origin` is not an http(s) URL
    /// - a manifest entry or the navigation fallback does not resolve against the origin
    /// - route names are empty or repeated, or a route pattern is not a valid regex
    ///
    /// Returns `ConfigError::Missing` if the manifest is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_prefix.trim().is_empty() || self.cache_prefix.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "cache_prefix".into(),
                reason: "must be non-empty and contain no whitespace".into(),
            });
        }

        let origin = self.origin_url()?;

        if self.manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "manifest".into(),
                hint: "list at least the shell document, e.g. [\"/\", \"/index.html\"]".into(),
            });
        }
        for entry in &self.manifest {
            origin.join(entry.trim()).map_err(|e| ConfigError::Invalid {
                field: "manifest".into(),
                reason: format!("{entry}: {e}"),
            })?;
        }

        if let Some(fallback) = &self.navigation_fallback {
            origin.join(fallback.trim()).map_err(|e| ConfigError::Invalid {
                field: "navigation_fallback".into(),
                reason: format!("{fallback}: {e}"),
            })?;
            if !self.manifest.iter().any(|m| m.trim() == fallback.trim()) {
                tracing::warn!(fallback = %fallback, "navigation_fallback is not precached; offline navigations may fail");
            }
        }

        let mut names = HashSet::new();
        for route in &self.routes {
            if route.name.is_empty() {
                return Err(ConfigError::Invalid { field: "routes".into(), reason: "route name must not be empty".into() });
            }
            if !names.insert(route.name.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "routes".into(),
                    reason: format!("duplicate route name: {}", route.name),
                });
            }
            if let Some(pattern) = &route.pattern {
                regex::Regex::new(pattern).map_err(|e| ConfigError::Invalid {
                    field: "routes".into(),
                    reason: format!("{}: invalid pattern: {e}", route.name),
                })?;
            }
            if route.strategy == Strategy::NetworkOnly && !route.expiration.is_unbounded() {
                tracing::warn!(route = %route.name, "expiration has no effect on a network-only route");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RouteConfig;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_max_bytes_exceeds_limit() {
        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() }; // 51MB
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_cache_prefix_whitespace() {
        let config = AppConfig { cache_prefix: "my cache".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_prefix"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_empty_manifest() {
        let config = AppConfig { manifest: Vec::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "manifest"));
    }

    #[test]
    fn test_validate_duplicate_route() {
        let mut config = AppConfig::default();
        config.routes.push(config.routes[0].clone());
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, reason }) if field == "routes" && reason.contains("duplicate")));
    }

    #[test]
    fn test_validate_bad_pattern() {
        let config = AppConfig {
            routes: vec![RouteConfig::new("broken", Strategy::CacheFirst).pattern("(unclosed")],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "routes"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, ..Default::default() }; // minimum valid values
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_values() {
        let config = AppConfig { max_bytes: 50 * 1024 * 1024, timeout_ms: 300_000, ..Default::default() }; // exactly 50MB
        assert!(config.validate().is_ok());
    }
}
