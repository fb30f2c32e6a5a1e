//! Request-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the store key for a request: SHA-256 over the upper-cased method
/// and the absolute URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
