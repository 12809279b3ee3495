//! Middleware entry points for the page cache.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::page::replay;
use super::{CacheConfig, CacheStore, HeaderSanitizer, StoreError};
use crate::context::Context;
use crate::http::{Response, StatusCode};
use crate::middleware::{BoxResponse, Middleware, Next};

/// The store installed by [`CacheMiddleware`], looked up by type in the request
/// extensions.
///
/// # Examples
///
/// ```rust,no_run
/// use pagecache::cache::CacheHandle;
/// use pagecache::context::Context;
/// use pagecache::{Response, StatusCode};
///
/// async fn purge(ctx: Context) -> Response {
///     match ctx.extensions().get::<CacheHandle>() {
///         Some(cache) if cache.store().flush().is_ok() => Response::new(StatusCode::NoContent),
///         _ => Response::new(StatusCode::InternalServerError),
///     }
/// }
/// ```
#[derive(Clone)]
pub struct CacheHandle(pub Arc<dyn CacheStore>);

impl CacheHandle {
    pub fn store(&self) -> &dyn CacheStore {
        self.0.as_ref()
    }
}

/// Makes a store available to every downstream handler as a [`CacheHandle`].
pub struct CacheMiddleware {
    store: Arc<dyn CacheStore>,
}

impl CacheMiddleware {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

impl Middleware for CacheMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> BoxResponse {
        ctx.extensions_mut()
            .insert(CacheHandle(Arc::clone(&self.store)));
        Box::pin(next.run(ctx))
    }
}

/// Site-wide read-through for pages cached elsewhere.
///
/// Any request whose target has a live record is answered from the store,
/// without reaching the router's handlers. The replay carries the sanitized
/// stored headers, status and body, and no diagnostic header. Misses and store
/// failures pass through untouched; `SiteCache` never writes.
pub struct SiteCache {
    store: Arc<dyn CacheStore>,
    config: Arc<CacheConfig>,
    sanitizer: HeaderSanitizer,
}

impl SiteCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Uses `config` for key derivation and header rules; it must match the
    /// configuration the pages were cached with.
    pub fn with_config(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            sanitizer: config.sanitizer(),
            config: Arc::new(config),
        }
    }
}

impl Middleware for SiteCache {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        let key = self.config.key_for(&ctx.request().target());
        let record = match self.store.get(&key) {
            Ok(record) => record,
            Err(StoreError::Miss) => return Box::pin(next.run(ctx)),
            Err(e) => {
                warn!(key = %key, error = %e, "site cache lookup failed");
                return Box::pin(next.run(ctx));
            }
        };

        debug!(key = %key, "site cache hit");
        let mut response = Response::new(StatusCode::Ok);
        if let Err(e) = replay(&mut response, &record, Some(&self.sanitizer), None) {
            error!(key = %key, error = %e, "failed to replay cached response");
        }
        Box::pin(async move { response })
    }
}
