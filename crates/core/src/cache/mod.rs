//! SQLite-backed cache storage for offline assets.
//!
//! This module provides durable, named cache stores using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Named stores, one per worker version, purged as a unit
//! - Request identity keys (method + URL) hashed with SHA-256
//! - Atomic bulk precache
//! - Per-route expiration by count and age
//! - Automatic schema migrations and WAL mode
//!
//! Every operation goes through the single connection thread, so concurrent
//! handlers never interleave partial writes.

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod registration;
pub mod storage;
pub mod store;

pub use crate::Error;

use chrono::{DateTime, SecondsFormat, Utc};

pub use connection::CacheDb;
pub use store::{CacheStore, EntryMeta};

/// Route name recorded on entries written at install time.
pub const PRECACHE_ROUTE: &str = "precache";

/// Fixed-width timestamp so stored values order lexicographically.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
