//! Resolution strategies over one cache store.
//!
//! Writes made while serving are spawned on the worker's task tracker so the
//! response path never waits for storage.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;

use offvault_core::{CacheStore, Error, Request, Response, Strategy};

use super::router::Route;
use crate::fetch::Fetcher;

/// Runs strategies for a worker version against its store.
#[derive(Clone)]
pub(crate) struct CacheHandler {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    tracker: TaskTracker,
}

impl CacheHandler {
    pub(crate) fn new(store: CacheStore, fetcher: Arc<dyn Fetcher>, tracker: TaskTracker) -> Self {
        Self { store, fetcher, tracker }
    }

    pub(crate) fn store(&self) -> &CacheStore {
        &self.store
    }

    pub(crate) fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub(crate) async fn resolve(&self, route: &Route, request: &Request) -> Result<Response, Error> {
        let max_age = route.config().expiration.max_age();
        match route.config().strategy {
            Strategy::CacheFirst => {
                if let Some(hit) = self.lookup(request, max_age).await {
                    return Ok(hit);
                }
                let response = self.fetcher.fetch(request).await?;
                self.store_in_background(route, request, &response);
                Ok(response)
            }
            Strategy::NetworkFirst => match self.fetcher.fetch(request).await {
                Ok(response) => {
                    self.store_in_background(route, request, &response);
                    Ok(response)
                }
                Err(err) if err.is_network() => match self.lookup(request, max_age).await {
                    Some(hit) => Ok(hit),
                    None => Err(err),
                },
                Err(err) => Err(err),
            },
            Strategy::CacheOnly => self
                .lookup(request, max_age)
                .await
                .ok_or_else(|| Error::NotCached(request.url.to_string())),
            Strategy::NetworkOnly => self.fetcher.fetch(request).await,
        }
    }

    /// Stored response for the request, if present and younger than `max_age`.
    ///
    /// Read failures are logged and treated as a miss.
    pub(crate) async fn lookup(&self, request: &Request, max_age: Option<Duration>) -> Option<Response> {
        let hit = match self.store.match_request(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(store = self.store.name(), url = %request.url, error = %e, "cache read failed");
                return None;
            }
        };

        let Some(response) = hit else {
            tracing::debug!(store = self.store.name(), url = %request.url, "cache miss");
            return None;
        };

        if let (Some(limit), Some(age)) = (max_age, response.cached_age())
            && age > limit
        {
            tracing::debug!(url = %request.url, age_secs = age.as_secs(), "cached entry expired");
            return None;
        }

        tracing::debug!(store = self.store.name(), url = %request.url, "cache hit");
        Some(response)
    }

    /// Write a duplicate of `response` and apply the route's expiration,
    /// without blocking the caller.
    pub(crate) fn store_in_background(&self, route: &Route, request: &Request, response: &Response) {
        let config = route.config();
        if !request.is_get() || config.strategy == Strategy::NetworkOnly {
            return;
        }
        if !config.is_cacheable(response.status, response.size()) {
            tracing::debug!(
                url = %request.url,
                status = response.status,
                size = response.size(),
                route = route.name(),
                "response not cacheable"
            );
            return;
        }

        let store = self.store.clone();
        let request = request.clone();
        let response = response.clone();
        let route_name = route.name().to_string();
        let expiration = config.expiration;

        self.tracker.spawn(async move {
            if let Err(e) = store.put(&request, &response, Some(&route_name)).await {
                tracing::warn!(store = store.name(), url = %request.url, error = %e, "cache write failed");
                return;
            }
            match store.expire(&route_name, &expiration).await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!(route = %route_name, evicted, "expired cache entries"),
                Err(e) => tracing::warn!(route = %route_name, error = %e, "cache expiration failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::FakeFetcher;
    use offvault_core::{CacheDb, RouteConfig};
    use url::Url;

    async fn handler(fetcher: &Arc<FakeFetcher>) -> (CacheHandler, TaskTracker) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("v1").await.unwrap();
        let tracker = TaskTracker::new();
        let fetcher: Arc<dyn Fetcher> = fetcher.clone();
        (CacheHandler::new(store, fetcher, tracker.clone()), tracker)
    }

    async fn settle(tracker: &TaskTracker) {
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn route(strategy: Strategy) -> Route {
        Route::compile(RouteConfig::new("test", strategy)).unwrap()
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let fetcher = FakeFetcher::new().serve("https://course.test/app.css", "live");
        let (handler, _) = handler(&fetcher).await;
        let request = get("https://course.test/app.css");
        handler.store().put(&request, &Response::new(200, "cached"), Some("test")).await.unwrap();

        let response = handler.resolve(&route(Strategy::CacheFirst), &request).await.unwrap();
        assert_eq!(response.text(), Some("cached"));
        assert_eq!(fetcher.calls("https://course.test/app.css"), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_stores_copy() {
        let fetcher = FakeFetcher::new().serve("https://course.test/app.js", "js");
        let (handler, tracker) = handler(&fetcher).await;
        let request = get("https://course.test/app.js");

        let response = handler.resolve(&route(Strategy::CacheFirst), &request).await.unwrap();
        assert_eq!(response.text(), Some("js"));
        assert!(!response.is_from_cache());

        settle(&tracker).await;
        fetcher.set_offline(true);
        let again = handler.resolve(&route(Strategy::CacheFirst), &request).await.unwrap();
        assert_eq!(again.text(), Some("js"));
        assert!(again.is_from_cache());
        assert_eq!(fetcher.calls("https://course.test/app.js"), 1);
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_fails() {
        let fetcher = FakeFetcher::new();
        fetcher.set_offline(true);
        let (handler, _) = handler(&fetcher).await;

        let err = handler.resolve(&route(Strategy::CacheFirst), &get("https://course.test/x.js")).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_cache_first_expired_entry_is_miss() {
        let fetcher = FakeFetcher::new().serve("https://course.test/a.png", "fresh");
        let (handler, _) = handler(&fetcher).await;
        let request = get("https://course.test/a.png");
        handler.store().put(&request, &Response::new(200, "stale"), Some("test")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let short = Route::compile(RouteConfig::new("test", Strategy::CacheFirst).expiration(None, Some(1))).unwrap();
        let response = handler.resolve(&short, &request).await.unwrap();
        assert_eq!(response.text(), Some("fresh"));
        assert_eq!(fetcher.calls("https://course.test/a.png"), 1);
    }

    #[tokio::test]
    async fn test_network_first_prefers_live_then_cache() {
        let fetcher = FakeFetcher::new().serve("https://course.test/feed", "v2");
        let (handler, _) = handler(&fetcher).await;
        let request = get("https://course.test/feed");
        handler.store().put(&request, &Response::new(200, "v1"), Some("test")).await.unwrap();

        let live = handler.resolve(&route(Strategy::NetworkFirst), &request).await.unwrap();
        assert_eq!(live.text(), Some("v2"));

        fetcher.set_offline(true);
        let fallback = handler.resolve(&route(Strategy::NetworkFirst), &request).await.unwrap();
        assert!(fallback.is_from_cache());
    }

    #[tokio::test]
    async fn test_network_first_http_error_is_returned() {
        let fetcher = FakeFetcher::new().respond("https://course.test/gone", Response::new(404, "nope"));
        let (handler, tracker) = handler(&fetcher).await;
        let request = get("https://course.test/gone");

        let response = handler.resolve(&route(Strategy::NetworkFirst), &request).await.unwrap();
        assert_eq!(response.status, 404);

        settle(&tracker).await;
        assert_eq!(handler.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_only() {
        let fetcher = FakeFetcher::new().serve("https://course.test/a.css", "live");
        let (handler, _) = handler(&fetcher).await;

        let err = handler.resolve(&route(Strategy::CacheOnly), &get("https://course.test/a.css")).await.unwrap_err();
        assert!(matches!(err, Error::NotCached(_)));
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_network_only_never_stores() {
        let fetcher = FakeFetcher::new().serve("https://course.test/live", "x");
        let (handler, tracker) = handler(&fetcher).await;

        handler.resolve(&route(Strategy::NetworkOnly), &get("https://course.test/live")).await.unwrap();
        settle(&tracker).await;
        assert_eq!(handler.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversize_served_not_stored() {
        let fetcher = FakeFetcher::new().serve("https://fonts.test/big.woff2", vec![0u8; 64]);
        let (handler, tracker) = handler(&fetcher).await;
        let fonts = Route::compile(RouteConfig::new("fonts", Strategy::CacheFirst).max_entry_bytes(32)).unwrap();

        let response = handler.resolve(&fonts, &get("https://fonts.test/big.woff2")).await.unwrap();
        assert_eq!(response.size(), 64);

        settle(&tracker).await;
        assert_eq!(handler.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_opaque_response_is_stored() {
        let url = "https://cdn.test/tailwind.css";
        let fetcher = FakeFetcher::new().respond(url, Response::opaque(url, "css"));
        let (handler, tracker) = handler(&fetcher).await;

        handler.resolve(&route(Strategy::CacheFirst), &get(url)).await.unwrap();
        settle(&tracker).await;

        let cached = handler.store().match_request(&get(url)).await.unwrap().unwrap();
        assert!(cached.is_opaque());
    }

    #[tokio::test]
    async fn test_background_write_applies_expiration() {
        let fetcher = FakeFetcher::new()
            .serve("https://course.test/a.png", "a")
            .serve("https://course.test/b.png", "b")
            .serve("https://course.test/c.png", "c");
        let (handler, tracker) = handler(&fetcher).await;
        let images = Route::compile(RouteConfig::new("images", Strategy::CacheFirst).expiration(Some(2), None)).unwrap();

        for name in ["a", "b", "c"] {
            handler.resolve(&images, &get(&format!("https://course.test/{name}.png"))).await.unwrap();
            settle(&tracker).await;
        }

        let urls: Vec<_> = handler.store().keys().await.unwrap().into_iter().map(|k| k.url).collect();
        assert_eq!(urls, ["https://course.test/b.png", "https://course.test/c.png"]);
    }

    #[tokio::test]
    async fn test_expiration_spares_precached_pages() {
        let shell = "https://course.test/index.html";
        let mut fetcher = FakeFetcher::new().serve(shell, "<html>live</html>");
        for i in 0..3 {
            fetcher = fetcher.serve(&format!("https://course.test/q/{i}"), "page");
        }
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.precache("v1", vec![(get(shell), Response::new(200, "<html>shell</html>"))]).await.unwrap();
        let tracker = TaskTracker::new();
        let dyn_fetcher: Arc<dyn Fetcher> = fetcher.clone();
        let handler = CacheHandler::new(store, dyn_fetcher, tracker.clone());
        let pages = Route::compile(RouteConfig::new("pages", Strategy::NetworkFirst).expiration(Some(2), None)).unwrap();

        handler.resolve(&pages, &get(shell)).await.unwrap();
        settle(&tracker).await;
        for i in 0..3 {
            handler.resolve(&pages, &get(&format!("https://course.test/q/{i}"))).await.unwrap();
            settle(&tracker).await;
        }

        let keys = handler.store().keys().await.unwrap();
        let urls: Vec<_> = keys.iter().map(|k| k.url.as_str()).collect();
        assert_eq!(urls, [shell, "https://course.test/q/1", "https://course.test/q/2"]);

        fetcher.set_offline(true);
        let cached = handler.resolve(&pages, &get(shell)).await.unwrap();
        assert_eq!(cached.text(), Some("<html>live</html>"));
    }

    #[tokio::test]
    async fn test_write_failure_does_not_fail_response() {
        let fetcher = FakeFetcher::new().serve("https://course.test/app.js", "js");
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("v1").await.unwrap();
        db.delete_store("v1").await.unwrap();
        let tracker = TaskTracker::new();
        let dyn_fetcher: Arc<dyn Fetcher> = fetcher.clone();
        let handler = CacheHandler::new(store, dyn_fetcher, tracker.clone());

        let response = handler.resolve(&route(Strategy::CacheFirst), &get("https://course.test/app.js")).await.unwrap();
        assert_eq!(response.text(), Some("js"));
        settle(&tracker).await;
    }
}
