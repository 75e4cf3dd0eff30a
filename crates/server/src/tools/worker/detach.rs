//! client_detach tool implementation.
//!
//! Closing the last page of the active version lets a waiting version take over.

use offvault_client::ClientId;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ServerState, json_result};

/// Input parameters for client_detach tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientDetachParams {
    /// Page returned by client_attach.
    pub client_id: ClientId,
}

/// Output structure for client_detach tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientDetachOutput {
    pub client_id: ClientId,
    /// Active store name after the page closed.
    pub active: Option<String>,
    /// Store name of a version still waiting, if any.
    pub waiting: Option<String>,
}

/// Implementation of the client_detach tool.
pub async fn detach_impl(state: &ServerState, params: ClientDetachParams) -> Result<CallToolResult, McpError> {
    state.registration.detach_client(params.client_id).await?;
    let status = state.registration.status().await?;

    json_result(&ClientDetachOutput {
        client_id: params.client_id,
        active: status.active.map(|w| w.cache_name),
        waiting: status.waiting.map(|w| w.cache_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticSite, app_config, parse, registered_state};
    use crate::tools::worker::lifecycle::update_with;
    use crate::tools::worker::{
        ClientAttachOutput, WorkerFetchOutput, WorkerFetchParams, WorkerUpdateOutput, WorkerUpdateParams, attach_impl,
        fetch_impl,
    };
    use offvault_client::RegisterOutcome;
    use offvault_core::RequestMode;

    #[tokio::test]
    async fn test_detach_last_page_activates_waiting_version() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;
        let page: ClientAttachOutput = parse(&attach_impl(&state).await.unwrap());

        let mut config = app_config();
        config.skip_waiting = false;
        let params = WorkerUpdateParams { version: Some(2), manifest: None };
        let update: WorkerUpdateOutput = parse(&update_with(&state, config, params).await.unwrap());
        assert_eq!(update.outcome, RegisterOutcome::Waiting);

        let fetch = WorkerFetchParams {
            url: "/app.css".into(),
            method: "GET".into(),
            mode: RequestMode::Cors,
            destination: None,
            client_id: Some(page.client_id),
        };
        let fetched: WorkerFetchOutput = parse(&fetch_impl(&state, fetch).await.unwrap());
        assert_eq!(fetched.status, 200);

        let output: ClientDetachOutput =
            parse(&detach_impl(&state, ClientDetachParams { client_id: page.client_id }).await.unwrap());
        assert_eq!(output.active, Some(update.cache_name));
        assert!(output.waiting.is_none());
    }

    #[tokio::test]
    async fn test_detach_unknown_client() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let err = detach_impl(&state, ClientDetachParams { client_id: 7 }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
