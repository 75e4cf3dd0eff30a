//! Network transport for intercepted requests.
//!
//! ### Fetcher
//! - [`Fetcher`] is the seam between the worker and the network; tests swap
//!   in an instrumented fake.
//! - [`FetchClient`] is the reqwest implementation.
//!
//! ### Response typing
//! - Same-origin responses are `basic`.
//! - Cross-origin `no-cors` responses are `opaque`: status 0, no headers.
//! - Other cross-origin responses are `cors`.
//!
//! ### Limits and failures
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Timeouts map to `FETCH_TIMEOUT`, every other transport failure to
//!   `NETWORK_ERROR`. HTTP error statuses are responses, not errors.

pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, Url, header};

use offvault_core::{AppConfig, ConfigError, Error, Request, RequestMode, Response, ResponseType};

pub use url::{UrlError, canonicalize};

/// Performs the live network half of a fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue the request. Transport failures are `Err`; any HTTP status is `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offvault/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// App origin used to type responses. Without it every response is `basic`.
    pub origin: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offvault/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Transport settings from the application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: Some(config.origin_url()?),
            ..Default::default()
        })
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let response_type = classify(request, self.config.origin.as_ref())?;

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;
        let accept = if request.is_navigation() {
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
        } else {
            "*/*"
        };

        let response = self
            .http
            .request(method, request.url.as_str())
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| transport_error(&e, request))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response.bytes().await.map_err(|e| transport_error(&e, request))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        if response_type == ResponseType::Opaque {
            return Ok(Response::opaque(final_url, body));
        }

        let mut resp = Response::new(status.as_u16(), body).with_url(final_url).with_type(response_type);
        if let Some(reason) = status.canonical_reason() {
            resp.status_text = reason.to_string();
        }
        resp.headers = headers;
        Ok(resp)
    }
}

/// Response type the page would see for this request.
fn classify(request: &Request, origin: Option<&Url>) -> Result<ResponseType, Error> {
    let Some(origin) = origin else {
        return Ok(ResponseType::Basic);
    };
    if request.is_same_origin(origin) {
        return Ok(ResponseType::Basic);
    }
    match request.mode {
        RequestMode::NoCors => Ok(ResponseType::Opaque),
        RequestMode::SameOrigin => {
            Err(Error::InvalidInput(format!("same-origin request to cross-origin URL {}", request.url)))
        }
        RequestMode::Cors | RequestMode::Navigate => Ok(ResponseType::Cors),
    }
}

fn transport_error(err: &reqwest::Error, request: &Request) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{} {}: {err}", request.method, request.url))
    } else {
        Error::Network(format!("{} {}: {err}", request.method, request.url))
    }
}
