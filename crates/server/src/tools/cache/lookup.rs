//! cache_match tool implementation.
//!
//! Looks up one request identity in a store without touching the network.

use offvault_client::canonicalize;
use offvault_core::{Error, Request, ResponseType};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{ServerState, json_result};

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Absolute URL, or a path resolved against the app origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Store to search (default: the active store).
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub store: String,
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub content_type: Option<String>,
    pub size: usize,
    pub stored_at: Option<String>,
    /// Body as text. `None` for opaque or non-UTF-8 bodies.
    pub body: Option<String>,
}

/// Implementation of the cache_match tool.
pub async fn match_impl(state: &ServerState, params: CacheMatchParams) -> Result<CallToolResult, McpError> {
    let origin = state.origin().await?;
    let url = canonicalize(&params.url, &origin).map_err(Error::from)?;
    let mut request = Request::get(url);
    if let Some(method) = params.method.as_deref() {
        request = request.with_method(method);
    }

    let name = state.store_name(params.store).await?;
    let response = state
        .registration
        .db()
        .store(&name)
        .match_request(&request)
        .await?
        .ok_or_else(|| Error::NotCached(request.url.to_string()))?;

    let output = CacheMatchOutput {
        store: name,
        url: request.url.to_string(),
        status: response.status,
        response_type: response.response_type,
        content_type: response.content_type().map(str::to_string),
        size: response.size(),
        stored_at: response.cached_at.clone(),
        body: if response.is_opaque() { None } else { response.text().map(str::to_string) },
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{StaticSite, parse, registered_state};

    fn params(url: &str) -> CacheMatchParams {
        CacheMatchParams { url: url.into(), method: None, store: None }
    }

    #[tokio::test]
    async fn test_match_precached_entry_offline() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;
        site.set_offline(true);

        let output: CacheMatchOutput = parse(&match_impl(&state, params("/index.html")).await.unwrap());
        assert_eq!(output.status, 200);
        assert_eq!(output.body.as_deref(), Some("<html>shell</html>"));
        assert!(output.stored_at.is_some());
    }

    #[tokio::test]
    async fn test_match_miss_is_not_cached() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let err = match_impl(&state, params("/quiz.js")).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_match_method_is_part_of_identity() {
        let site = StaticSite::course();
        let state = registered_state(&site).await;

        let head = CacheMatchParams { url: "/".into(), method: Some("HEAD".into()), store: None };
        assert!(match_impl(&state, head).await.is_err());
    }
}
