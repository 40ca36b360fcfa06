//! Cache key generation for stored entries.

use sha2::{Digest, Sha256};

/// Compute the entry key for a request URL.
///
/// Requests are keyed by URL only (the method is implicitly GET), so the
/// key is the SHA-256 of the URL string with any fragment stripped.
pub fn compute_entry_key(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let mut hasher = Sha256::new();
    hasher.update(without_fragment.as_bytes());
    hex::encode(hasher.finalize())
}
