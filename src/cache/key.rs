//! Cache key derivation.
//!
//! A key is `namespace + ":" + identity`, where the identity (a request target or
//! path) is percent-escaped. Identities whose escaped form is longer than the limit
//! are replaced by the hex SHA-256 digest of the raw identity, which keeps keys
//! short enough for any backend at the cost of readability.

use sha2::{Digest, Sha256};

use super::DEFAULT_MAX_KEY_LEN;

/// Derives the cache key for `identity` under `namespace` with the default
/// 200-character limit.
///
/// # Examples
///
/// ```
/// use pagecache::cache::derive_key;
///
/// assert_eq!(derive_key("pages", "/ping?x=1"), "pages:%2Fping%3Fx%3D1");
/// ```
pub fn derive_key(namespace: &str, identity: &str) -> String {
    derive_key_with_limit(namespace, identity, DEFAULT_MAX_KEY_LEN)
}

/// Same as [`derive_key`] with an explicit escaped-length limit.
pub fn derive_key_with_limit(namespace: &str, identity: &str, max_len: usize) -> String {
    let escaped = urlencoding::encode(identity);
    let identity = if escaped.len() > max_len {
        digest(identity)
    } else {
        escaped.into_owned()
    };

    let mut key = String::with_capacity(namespace.len() + 1 + identity.len());
    key.push_str(namespace);
    key.push(':');
    key.push_str(&identity);
    key
}

fn digest(identity: &str) -> String {
    hex::encode(Sha256::digest(identity.as_bytes()))
}
