//! Intercepted request model.
//!
//! A request only lives for the duration of one interception. Its identity
//! for cache purposes is the method plus the canonical URL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the request was issued by the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load or reload.
    Navigate,
    /// Same-origin only.
    SameOrigin,
    /// Cross-origin without CORS; the response is opaque.
    NoCors,
    /// CORS request.
    #[default]
    Cors,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::SameOrigin => "same-origin",
            Self::NoCors => "no-cors",
            Self::Cors => "cors",
        }
    }
}

/// What the response is going to be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    Audio,
    Video,
    Worker,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Document => "document",
            Self::Script => "script",
            Self::Style => "style",
            Self::Image => "image",
            Self::Font => "font",
            Self::Manifest => "manifest",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Worker => "worker",
        }
    }

    /// Guess the destination from the path extension.
    ///
    /// Hosts that cannot report a destination (e.g. a tool call with only a
    /// URL) still get routed by resource class this way.
    pub fn infer(url: &Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        let ext = match path.rsplit_once('/').map(|(_, last)| last).and_then(|last| last.rsplit_once('.')) {
            Some((_, ext)) => ext,
            None => return Self::Empty,
        };

        match ext {
            "html" | "htm" => Self::Document,
            "js" | "mjs" => Self::Script,
            "css" => Self::Style,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" => Self::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            "webmanifest" => Self::Manifest,
            "mp3" | "ogg" | "wav" => Self::Audio,
            "mp4" | "webm" => Self::Video,
            _ => Self::Empty,
        }
    }
}

/// One outgoing fetch seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    /// Canonical absolute URL.
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
}

impl Request {
    /// A sub-resource GET with the destination inferred from the URL.
    pub fn get(url: Url) -> Self {
        let destination = Destination::infer(&url);
        Self { method: "GET".into(), url, mode: RequestMode::Cors, destination }
    }

    /// A page navigation.
    pub fn navigate(url: Url) -> Self {
        Self { method: "GET".into(), url, mode: RequestMode::Navigate, destination: Destination::Document }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.trim().to_ascii_uppercase();
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Whether the request targets the same origin as `origin`.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}
