//! Page cache: replays previously computed responses instead of re-running handlers.
//!
//! The cache sits between the router and a handler. For each request it derives a
//! key from the request target, asks a [`CacheStore`] for a stored
//! [`ResponseRecord`], and either replays that record (a *hit*) or runs the handler
//! with a [`ResponseCollector`] in the write path so the produced response is stored
//! for the next request (a *miss*).
//!
//! ## Core types
//!
//! - [`CachePage`]: the per-route decision engine and its variants.
//! - [`CacheStore`]: storage contract; [`MemoryStore`] is the in-process backend.
//! - [`ResponseCollector`]: write-intercepting sink that persists on completion.
//! - [`HeaderSanitizer`]: strips credentials and diagnostics from stored headers.
//! - [`KeyLocks`]: per-key (or per-route) serialization of cache misses.
//! - [`CacheMiddleware`] and [`SiteCache`]: middleware-pipeline entry points.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pagecache::cache::{MemoryStore, cache_page};
//! use pagecache::context::Context;
//! use pagecache::{Response, Router, StatusCode};
//!
//! let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
//! let mut router = Router::new();
//! router.get(
//!     "/ping",
//!     cache_page(store, Duration::from_secs(3), |_ctx: Context| async {
//!         Response::new(StatusCode::Ok).body("pong")
//!     }),
//! );
//! ```

use serde::Deserialize;

pub mod collector;
pub mod guard;
pub mod headers;
pub mod key;
pub mod middleware;
pub mod page;
pub mod record;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::ResponseCollector;
pub use guard::{KeyLocks, LockScope};
pub use headers::HeaderSanitizer;
pub use key::derive_key;
pub use middleware::{CacheHandle, CacheMiddleware, SiteCache};
pub use page::{
    CachePage, HeaderMode, KeyMode, cache_page, cache_page_atomic, cache_page_without_header,
    cache_page_without_query,
};
pub use record::ResponseRecord;
pub use store::{CacheStore, MemoryStore, StoreError};

/// Namespace prefixed to every page cache key.
pub const DEFAULT_NAMESPACE: &str = "pagecache.page";

/// Diagnostic header reporting whether a response was replayed.
pub const CACHE_STATUS_HEADER: &str = "X-Cache-Status";

/// Escaped identities longer than this are replaced by their digest.
pub const DEFAULT_MAX_KEY_LEN: usize = 200;

/// Immutable settings shared by every cache entry point.
///
/// Built once at route registration and never changed afterwards. Every field has
/// a default, so a partial JSON document is enough to load one:
///
/// ```
/// use pagecache::cache::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(r#"{"namespace": "shop"}"#).unwrap();
/// assert_eq!(config.namespace(), "shop");
/// assert_eq!(config.max_key_len(), 200);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    namespace: String,
    status_header: String,
    disallowed_headers: Vec<String>,
    max_key_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            status_header: CACHE_STATUS_HEADER.to_string(),
            disallowed_headers: vec!["Authorization".to_string(), CACHE_STATUS_HEADER.to_string()],
            max_key_len: DEFAULT_MAX_KEY_LEN,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with the default namespace, diagnostic header, and
    /// disallow-list (`Authorization`, `X-Cache-Status`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Adds a header name that must never be stored or replayed.
    #[must_use]
    pub fn disallow_header(mut self, name: impl Into<String>) -> Self {
        self.disallowed_headers.push(name.into());
        self
    }

    /// Sets the escaped-identity length above which keys are digested.
    #[must_use]
    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Returns the key namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the diagnostic header name.
    pub fn status_header(&self) -> &str {
        &self.status_header
    }

    /// Returns the disallow-list.
    pub fn disallowed_headers(&self) -> &[String] {
        &self.disallowed_headers
    }

    /// Returns the key length limit.
    pub fn max_key_len(&self) -> usize {
        self.max_key_len
    }

    /// Builds the sanitizer for this configuration's disallow-list.
    pub fn sanitizer(&self) -> HeaderSanitizer {
        HeaderSanitizer::new(self.disallowed_headers.iter().cloned())
    }

    /// Derives the cache key for a request identity under this configuration.
    pub fn key_for(&self, identity: &str) -> String {
        key::derive_key_with_limit(&self.namespace, identity, self.max_key_len)
    }
}
