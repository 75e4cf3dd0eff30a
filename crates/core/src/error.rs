//! Unified error types for offvault.
//!
//! Every variant carries an upper-case code prefix so failures read the same
//! in logs and in tool results.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport failure: DNS, refused connection, reset, unreachable host.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A manifest URL could not be precached.
    #[error("PRECACHE_FAILED: {url}: {reason}")]
    PrecacheFailed { url: String, reason: String },

    /// Install aborted; the new version is never promoted.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Stale store eviction did not converge.
    #[error("ACTIVATION_FAILED: {0}")]
    ActivationFailed(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Cache-only lookup found nothing.
    #[error("NOT_CACHED: {0}")]
    NotCached(String),

    /// No worker version is active yet.
    #[error("NO_ACTIVE_WORKER")]
    NoActiveWorker,

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether the failure came from the transport rather than from the server.
    ///
    /// Only these errors fall through to cache-based resolution.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32004, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::PrecacheFailed { .. } => (-32020, err.to_string()),
            Error::InstallFailed(msg) => (-32021, msg.clone()),
            Error::ActivationFailed(msg) => (-32022, msg.clone()),
            Error::InvalidState(msg) => (-32023, msg.clone()),
            Error::NotCached(msg) => (-32001, msg.clone()),
            Error::NoActiveWorker => (-32024, "No active worker".to_string()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
