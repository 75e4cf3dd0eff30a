//! worker_status, worker_update and worker_skip_waiting tool implementations.

use offvault_client::{RegisterOutcome, RegistrationStatus};
use offvault_core::AppConfig;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::{ServerState, json_result};

/// Implementation of the worker_status tool.
pub async fn status_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let status: RegistrationStatus = state.registration.status().await?;
    json_result(&status)
}

/// Input parameters for worker_update tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerUpdateParams {
    /// Deployment generation to install instead of the configured one.
    #[serde(default)]
    pub version: Option<u32>,

    /// Asset manifest to install instead of the configured one.
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

/// Output structure for worker_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerUpdateOutput {
    /// Store name of the version that was registered.
    pub cache_name: String,
    pub outcome: RegisterOutcome,
    pub status: RegistrationStatus,
}

/// Implementation of the worker_update tool.
///
/// Reloads configuration from the environment, applies overrides, and
/// registers the resulting version.
pub async fn update_impl(state: &ServerState, params: WorkerUpdateParams) -> Result<CallToolResult, McpError> {
    let config = AppConfig::load().map_err(ToolError::from)?;
    update_with(state, config, params).await
}

pub(crate) async fn update_with(
    state: &ServerState, mut config: AppConfig, params: WorkerUpdateParams,
) -> Result<CallToolResult, McpError> {
    if let Some(version) = params.version {
        config.version = version;
    }
    if let Some(manifest) = params.manifest {
        config.manifest = manifest;
    }
    config.validate().map_err(ToolError::from)?;

    let worker = config.worker_config().map_err(ToolError::from)?;
    let cache_name = worker.cache_name.clone();
    let outcome = state.registration.register(worker).await?;
    *state.config.write().await = config;

    tracing::info!(cache = %cache_name, ?outcome, "worker update");
    let status = state.registration.status().await?;
    json_result(&WorkerUpdateOutput { cache_name, outcome, status })
}

/// Output structure for worker_skip_waiting tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSkipWaitingOutput {
    /// Whether a waiting version was activated.
    pub activated: bool,
    pub active: Option<String>,
}

/// Implementation of the worker_skip_waiting tool.
pub async fn skip_waiting_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let activated = state.registration.skip_waiting().await?;
    let active = state.registration.active_store().await;
    json_result(&WorkerSkipWaitingOutput { activated, active })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticSite, app_config, parse, registered_state};
    use offvault_client::WorkerState;

    #[tokio::test]
    async fn test_status_reports_active_version() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let status: RegistrationStatus = parse(&status_impl(&state).await.unwrap());
        let active = status.active.unwrap();
        assert_eq!(active.cache_name, app_config().cache_name());
        assert_eq!(active.state, WorkerState::Activated);
        assert_eq!(status.stores.len(), 1);
    }

    #[tokio::test]
    async fn test_update_installs_new_version_and_evicts_old() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;
        let old = app_config().cache_name();

        let params = WorkerUpdateParams { version: Some(2), manifest: None };
        let output: WorkerUpdateOutput = parse(&update_with(&state, app_config(), params).await.unwrap());

        assert_eq!(output.outcome, RegisterOutcome::Activated);
        assert!(output.cache_name.starts_with("offvault-v2-"));
        assert_eq!(output.status.stores, [output.cache_name.clone()]);
        assert!(!output.status.stores.contains(&old));
        assert_eq!(state.config.read().await.version, 2);
    }

    #[tokio::test]
    async fn test_update_same_version_is_noop() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let output: WorkerUpdateOutput =
            parse(&update_with(&state, app_config(), WorkerUpdateParams::default()).await.unwrap());
        assert_eq!(output.outcome, RegisterOutcome::AlreadyActive);
    }

    #[tokio::test]
    async fn test_update_with_unreachable_manifest_fails() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;
        let old = app_config().cache_name();

        let params = WorkerUpdateParams { version: None, manifest: Some(vec!["/".into(), "/missing.css".into()]) };
        let err = update_with(&state, app_config(), params).await.unwrap_err();
        assert_eq!(err.code.0, -32021);
        assert_eq!(state.registration.active_store().await, Some(old));
    }

    #[tokio::test]
    async fn test_update_rejects_empty_manifest() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let params = WorkerUpdateParams { version: None, manifest: Some(Vec::new()) };
        let err = update_with(&state, app_config(), params).await.unwrap_err();
        assert_eq!(err.code.0, -32010);
    }

    #[tokio::test]
    async fn test_skip_waiting_without_waiting_version() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let output: WorkerSkipWaitingOutput = parse(&skip_waiting_impl(&state).await.unwrap());
        assert!(!output.activated);
        assert_eq!(output.active, Some(app_config().cache_name()));
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_waiting_version() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;
        let _page = state.registration.attach_client().await;

        let mut config = app_config();
        config.skip_waiting = false;
        let params = WorkerUpdateParams { version: Some(3), manifest: None };
        let output: WorkerUpdateOutput = parse(&update_with(&state, config, params).await.unwrap());
        assert_eq!(output.outcome, RegisterOutcome::Waiting);

        let skipped: WorkerSkipWaitingOutput = parse(&skip_waiting_impl(&state).await.unwrap());
        assert!(skipped.activated);
        assert_eq!(skipped.active, Some(output.cache_name));
    }
}
