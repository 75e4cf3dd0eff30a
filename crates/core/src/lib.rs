//! Core types and shared functionality for offvault.
//!
//! This crate provides:
//! - Request and response models
//! - Per-route caching policy
//! - Named cache stores with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod request;
pub mod response;

pub use cache::{CacheDb, CacheStore, EntryMeta};
pub use config::{AppConfig, ConfigError, WorkerConfig};
pub use error::Error;
pub use policy::{Expiration, RouteConfig, RouteScope, Strategy};
pub use request::{Destination, Request, RequestMode};
pub use response::{Response, ResponseType};
