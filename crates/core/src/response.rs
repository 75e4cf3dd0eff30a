//! Response model shared by the network and the cache.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Response type as exposed to the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response allowed by CORS.
    Cors,
    /// Cross-origin `no-cors` response: status 0, no headers, body hidden from the page.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "cors" => Ok(Self::Cors),
            "opaque" => Ok(Self::Opaque),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("unknown response type: {other}"))),
        }
    }
}

/// A resolved response, served live or from a cache store.
///
/// The body is reference counted, so returning a response to the page and
/// storing a duplicate shares one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub response_type: ResponseType,
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// When the entry was written, if this response came from a store.
    pub cached_at: Option<String>,
}

impl Response {
    /// Create a basic response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            response_type: ResponseType::Basic,
            url: String::new(),
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: body.into(),
            cached_at: None,
        }
    }

    /// Create an opaque response for a cross-origin `no-cors` fetch.
    pub fn opaque(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            response_type: ResponseType::Opaque,
            url: url.into(),
            status: 0,
            status_text: String::new(),
            headers: BTreeMap::new(),
            body: body.into(),
            cached_at: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Status in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.response_type == ResponseType::Opaque
    }

    /// Body size in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Body as UTF-8, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn is_from_cache(&self) -> bool {
        self.cached_at.is_some()
    }

    /// Time since the entry was stored. `None` for live responses or an
    /// unparseable timestamp.
    pub fn cached_age(&self) -> Option<Duration> {
        let stored = DateTime::parse_from_rfc3339(self.cached_at.as_deref()?).ok()?;
        (Utc::now() - stored.with_timezone(&Utc)).to_std().ok().or(Some(Duration::ZERO))
    }
}

/// Get status text for status code
fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
