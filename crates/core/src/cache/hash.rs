//! Cache key and version digest generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request identity (method + canonical URL).
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest of an ordered asset manifest.
///
/// Order matters: the manifest is consumed verbatim.
pub fn manifest_digest(manifest: &[String]) -> String {
    let mut hasher = Sha256::new();
    for url in manifest {
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
