//! worker_fetch tool implementation.
//!
//! Dispatches a fetch event to the active worker, exactly as an open page would.

use std::collections::BTreeMap;

use offvault_client::canonicalize;
use offvault_core::{Destination, Request, RequestMode, ResponseType};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ServerState, json_result};

/// Input parameters for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path resolved against the app origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode. `navigate` loads a page and gets the offline shell fallback.
    #[serde(default)]
    pub mode: RequestMode,

    /// Request destination; inferred from the URL extension when omitted.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Page issuing the request. Omit for a request with no page attached.
    #[serde(default)]
    pub client_id: Option<u64>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// The canonical URL requested.
    pub url: String,
    /// The final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: BTreeMap<String, String>,
    /// Body as text. `None` for opaque or non-UTF-8 bodies.
    pub body: Option<String>,
    /// Body size in bytes.
    pub size: usize,
    /// Whether the response was served from a cache store.
    pub from_cache: bool,
    /// When the served entry was stored.
    pub cached_at: Option<String>,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(state: &ServerState, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let origin = state.origin().await?;
    let url = canonicalize(&params.url, &origin).map_err(offvault_core::Error::from)?;

    let mut request = match params.mode {
        RequestMode::Navigate => Request::navigate(url),
        mode => Request::get(url).with_mode(mode),
    }
    .with_method(&params.method);
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }

    let response = match params.client_id {
        Some(client) => state.registration.fetch_from(client, &request).await?,
        None => state.registration.fetch(&request).await?,
    };

    let body = if response.is_opaque() { None } else { response.text().map(str::to_string) };
    let output = WorkerFetchOutput {
        url: request.url.to_string(),
        final_url: response.url.clone(),
        status: response.status,
        status_text: response.status_text.clone(),
        response_type: response.response_type,
        headers: response.headers.clone(),
        body,
        size: response.size(),
        from_cache: response.is_from_cache(),
        cached_at: response.cached_at.clone(),
    };
    json_result(&output)
}
