//! cache_keys tool implementation.
//!
//! Lists the entries of a store, oldest first.

use offvault_core::{EntryMeta, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ServerState, json_result};

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Store to list (default: the active store).
    #[serde(default)]
    pub store: Option<String>,

    /// Only list entries written by this route (`precache` for install-time entries).
    #[serde(default)]
    pub route: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub store: String,
    pub total_bytes: i64,
    pub entries: Vec<EntryMeta>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(state: &ServerState, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let name = state.store_name(params.store).await?;
    let db = state.registration.db();
    if !db.has_store(&name).await? {
        return Err(Error::InvalidInput(format!("no cache store named {name}")).into());
    }

    let mut entries = db.store(&name).keys().await?;
    if let Some(route) = params.route.as_deref() {
        entries.retain(|entry| entry.route.as_deref() == Some(route));
    }
    let total_bytes = entries.iter().map(|entry| entry.size).sum();

    json_result(&CacheKeysOutput { store: name, total_bytes, entries })
}
