//! Request key generation for cache entries.

use sha2::{Digest, Sha256};

/// Compute the store key for a request from its method and URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", "https://app.reelmind.ai/");
        let key2 = compute_request_key("GET", "https://app.reelmind.ai/");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_different_url() {
        let root = compute_request_key("GET", "https://app.reelmind.ai/");
        let index = compute_request_key("GET", "https://app.reelmind.ai/index.html");
        assert_ne!(root, index);
    }

    #[test]
    fn test_key_different_method() {
        let get = compute_request_key("GET", "https://app.reelmind.ai/");
        let head = compute_request_key("HEAD", "https://app.reelmind.ai/");
        assert_ne!(get, head);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "https://app.reelmind.ai/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
