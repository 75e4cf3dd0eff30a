//! Test fixtures for tool implementations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use offvault_client::{Fetcher, Registration};
use offvault_core::{AppConfig, CacheDb, Error, Request, Response};
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use tokio_util::task::TaskTracker;

use super::ServerState;

pub(crate) const ORIGIN: &str = "https://course.test";

/// Static site served from memory, with an offline switch.
#[derive(Default)]
pub(crate) struct StaticSite {
    pages: HashMap<String, &'static str>,
    offline: AtomicBool,
}

impl StaticSite {
    pub(crate) fn course() -> Arc<Self> {
        let pages = [
            ("/", "<html>root</html>"),
            ("/index.html", "<html>shell</html>"),
            ("/manifest.json", "{}"),
            ("/app.css", "body{}"),
            ("/quiz.js", "quiz()"),
        ];
        let pages = pages.into_iter().map(|(path, body)| (format!("{ORIGIN}{path}"), body)).collect();
        Arc::new(Self { pages, offline: AtomicBool::new(false) })
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for StaticSite {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        let response = match self.pages.get(request.url.as_str()) {
            Some(body) => Response::new(200, *body),
            None => Response::new(404, ""),
        };
        Ok(response.with_url(request.url.as_str()))
    }
}

pub(crate) fn app_config() -> AppConfig {
    AppConfig { origin: ORIGIN.into(), ..Default::default() }
}

/// Server state with the default config registered and activated.
pub(crate) async fn registered_state(site: &Arc<StaticSite>) -> ServerState {
    let db = CacheDb::open_in_memory().await.unwrap();
    let registration = Registration::open(db, site.clone(), TaskTracker::new()).await.unwrap();
    let config = app_config();
    registration.register(config.worker_config().unwrap()).await.unwrap();
    ServerState::new(registration, config)
}

pub(crate) fn parse<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
