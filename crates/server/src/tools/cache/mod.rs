//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and trimming cache stores
//! without going through the network.

pub mod keys;
pub mod lookup;
pub mod purge;

pub use keys::{CacheKeysOutput, CacheKeysParams, keys_impl};
pub use lookup::{CacheMatchOutput, CacheMatchParams, match_impl};
pub use purge::{CachePurgeOutput, CachePurgeParams, purge_impl};
