//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offvault server.

pub mod cache;
pub mod worker;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use offvault_client::Registration;
use offvault_core::{AppConfig, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::error::ToolError;

pub use cache::{CacheKeysParams, CacheMatchParams, CachePurgeParams};
pub use worker::{ClientDetachParams, WorkerFetchParams, WorkerUpdateParams};

/// State shared by every tool call.
#[derive(Clone)]
pub struct ServerState {
    pub registration: Registration,
    /// Configuration of the last successful registration.
    pub config: Arc<RwLock<AppConfig>>,
}

impl ServerState {
    pub fn new(registration: Registration, config: AppConfig) -> Self {
        Self { registration, config: Arc::new(RwLock::new(config)) }
    }

    pub async fn origin(&self) -> Result<Url, ToolError> {
        Ok(self.config.read().await.origin_url()?)
    }

    /// The named store, or the active one when `store` is omitted.
    pub async fn store_name(&self, store: Option<String>) -> Result<String, Error> {
        match store {
            Some(name) => Ok(name),
            None => self.registration.active_store().await.ok_or(Error::NoActiveWorker),
        }
    }
}

/// Encode a tool output as pretty JSON text content.
pub fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
