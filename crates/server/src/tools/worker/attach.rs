//! client_attach tool implementation.

use offvault_client::ClientId;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ServerState, json_result};

/// Output structure for client_attach tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientAttachOutput {
    /// Identifier to pass as `client_id` to worker_fetch and client_detach.
    pub client_id: ClientId,
    /// Store name of the version controlling the page; `None` when no
    /// version is active yet.
    pub controller: Option<String>,
}

/// Implementation of the client_attach tool.
pub async fn attach_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let client_id = state.registration.attach_client().await;
    let controller = state
        .registration
        .status()
        .await?
        .clients
        .into_iter()
        .find(|client| client.id == client_id)
        .and_then(|client| client.controller);

    tracing::debug!(client = client_id, controller = controller.as_deref().unwrap_or("none"), "page attached");
    json_result(&ClientAttachOutput { client_id, controller })
}
