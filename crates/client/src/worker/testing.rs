//! Instrumented in-process fetcher for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use offvault_core::{Error, Request, Response};

use crate::fetch::Fetcher;

/// Serves canned responses, counts calls per URL, and can go offline.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    responses: Mutex<HashMap<String, Response>>,
    unreachable: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl FakeFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn serve(self: Arc<Self>, url: &str, body: impl Into<Bytes>) -> Arc<Self> {
        let response = Response::new(200, body).with_url(url);
        self.responses.lock().unwrap().insert(url.to_string(), response);
        self
    }

    pub(crate) fn respond(self: Arc<Self>, url: &str, response: Response) -> Arc<Self> {
        self.responses.lock().unwrap().insert(url.to_string(), response);
        self
    }

    /// Make one URL fail at the transport level.
    pub(crate) fn unreachable(self: Arc<Self>, url: &str) -> Arc<Self> {
        self.unreachable.lock().unwrap().insert(url.to_string());
        self
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(&url) {
            return Err(Error::Network(format!("{url}: connection refused")));
        }

        let response = self.responses.lock().unwrap().get(&url).cloned();
        Ok(response.unwrap_or_else(|| Response::new(404, "").with_url(url)))
    }
}
