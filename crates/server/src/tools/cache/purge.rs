//! cache_purge tool implementation.
//!
//! Purges store entries by age, by a route's expiration rules, or by count.

use std::time::Duration;

use offvault_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ServerState, json_result};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Store to purge (default: the active store).
    #[serde(default)]
    pub store: Option<String>,

    /// Purge entries older than this many days.
    #[serde(default)]
    pub older_than_days: Option<u64>,

    /// Apply the expiration rules of this configured route.
    #[serde(default)]
    pub route: Option<String>,

    /// Keep only the newest N entries (LRU purge).
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub store: String,
    /// Number of entries deleted.
    pub deleted: u64,
    /// Entries left in the store.
    pub remaining: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(state: &ServerState, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.older_than_days.is_none() && params.route.is_none() && params.max_entries.is_none() {
        return Err(Error::InvalidInput(
            "At least one of older_than_days, route, or max_entries must be specified".to_string(),
        )
        .into());
    }

    let name = state.store_name(params.store).await?;
    let store = state.registration.db().store(&name);
    let mut deleted_total = 0u64;

    if let Some(days) = params.older_than_days {
        deleted_total += store.purge_older_than(Duration::from_secs(days.saturating_mul(24 * 60 * 60))).await?;
    }

    if let Some(route) = params.route {
        let expiration = state
            .config
            .read()
            .await
            .routes
            .iter()
            .find(|r| r.name == route)
            .map(|r| r.expiration)
            .ok_or_else(|| Error::InvalidInput(format!("unknown route: {route}")))?;
        deleted_total += store.expire(&route, &expiration).await?;
    }

    if let Some(max_entries) = params.max_entries {
        deleted_total += store.purge_lru(max_entries).await?;
    }

    tracing::info!(store = %name, deleted = deleted_total, "cache purge");
    let remaining = store.len().await?;
    json_result(&CachePurgeOutput { store: name, deleted: deleted_total, remaining })
}
