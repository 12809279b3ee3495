//! The per-route cache decision engine.
//!
//! [`CachePage`] wraps one handler. For every request it derives a key, replays a
//! stored response when one is live, and otherwise runs the handler with a
//! [`ResponseCollector`] between the handler's output and the live response.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::{
    CacheConfig, CacheStore, HeaderSanitizer, KeyLocks, LockScope, ResponseCollector,
    ResponseRecord, StoreError,
};
use crate::context::Context;
use crate::http::{Request, Response, ResponseWriter, StatusCode};
use crate::middleware::BoxResponse;
use crate::router::IntoHandler;

/// Which part of the request target identifies a cached page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Path and query string: `/search?q=a` and `/search?q=b` are different pages.
    #[default]
    WithQuery,
    /// Path only: every query string shares one entry.
    PathOnly,
}

/// Whether headers travel through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// Stored headers are replayed on a hit and the diagnostic header is set.
    #[default]
    Replay,
    /// A hit replays status and body only; no diagnostic header is written.
    Omit,
}

/// Page cache for a single route.
///
/// Built once at registration time and shared by every request to the route.
/// Cloning is cheap; clones share the store and, for atomic variants, the lock
/// registry.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use pagecache::cache::{CachePage, MemoryStore};
/// use pagecache::context::Context;
/// use pagecache::{Response, Router, StatusCode};
///
/// let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
/// let page = CachePage::new(store, Duration::from_secs(30))
///     .without_query()
///     .atomic();
///
/// let mut router = Router::new();
/// router.get(
///     "/report",
///     page.wrap(|_ctx: Context| async { Response::new(StatusCode::Ok).body("report") }),
/// );
/// ```
#[derive(Clone)]
pub struct CachePage {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    key_mode: KeyMode,
    header_mode: HeaderMode,
    config: Arc<CacheConfig>,
    sanitizer: HeaderSanitizer,
    locks: Option<KeyLocks>,
}

impl CachePage {
    /// Creates a cache that stores responses in `store` for `ttl`.
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        let config = CacheConfig::default();
        Self {
            store,
            ttl,
            key_mode: KeyMode::default(),
            header_mode: HeaderMode::default(),
            sanitizer: config.sanitizer(),
            config: Arc::new(config),
            locks: None,
        }
    }

    /// Ignores the query string when deriving keys.
    #[must_use]
    pub fn without_query(mut self) -> Self {
        self.key_mode = KeyMode::PathOnly;
        self
    }

    /// Caches status and body only.
    #[must_use]
    pub fn without_header(mut self) -> Self {
        self.header_mode = HeaderMode::Omit;
        self
    }

    /// Serializes concurrent requests for the same key, so a burst of misses
    /// runs the handler once.
    #[must_use]
    pub fn atomic(mut self) -> Self {
        self.locks = Some(KeyLocks::new(LockScope::Key));
        self
    }

    /// Serializes every request to the route, whatever its key.
    #[must_use]
    pub fn route_atomic(mut self) -> Self {
        self.locks = Some(KeyLocks::new(LockScope::Route));
        self
    }

    /// Replaces the default configuration.
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.sanitizer = config.sanitizer();
        self.config = Arc::new(config);
        self
    }

    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    pub fn header_mode(&self) -> HeaderMode {
        self.header_mode
    }

    /// Returns the cache key for `request`.
    pub fn key_for(&self, request: &Request) -> String {
        match self.key_mode {
            KeyMode::WithQuery => self.config.key_for(&request.target()),
            KeyMode::PathOnly => self.config.key_for(request.path()),
        }
    }

    /// Answers one request, from the store when possible and from `handler`
    /// otherwise.
    ///
    /// Store failures never fail the request: a lookup error is handled as a
    /// miss and a failed write leaves the computed response untouched.
    pub async fn serve<H>(&self, ctx: Context, handler: &H) -> Response
    where
        H: IntoHandler + ?Sized,
    {
        let key = self.key_for(ctx.request());

        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(&key).await),
            None => None,
        };

        let mut live = Response::new(StatusCode::Ok);
        let marker = match self.store.get(&key) {
            Ok(record) => {
                debug!(key = %key, status = record.status.as_u16(), "cache hit");
                let headers = self.status_header().map(|_| &self.sanitizer);
                let marker = self.status_header().map(|name| (name, "HIT"));
                if let Err(e) = replay(&mut live, &record, headers, marker) {
                    error!(key = %key, error = %e, "failed to replay cached response");
                }
                return live;
            }
            Err(StoreError::Miss) => {
                debug!(key = %key, "cache miss");
                self.status_header().map(|name| (name, "MISS"))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache lookup failed, running handler");
                None
            }
        };

        let mut collector = ResponseCollector::new(
            live,
            Arc::clone(&self.store),
            key,
            self.ttl,
            self.sanitizer.clone(),
        );

        let output = handler.call(ctx).await;
        let keep_alive = output.is_keep_alive();

        if let Err(e) = forward(&mut collector, &output, marker) {
            error!(key = %collector.key(), error = %e, "failed to forward response");
            return collector.into_inner().keep_alive(keep_alive);
        }

        if output.is_aborted() {
            let key = collector.key().to_owned();
            let live = collector.into_inner();
            match self.store.delete(&key) {
                Ok(()) | Err(StoreError::Miss) => {}
                Err(e) => warn!(key = %key, error = %e, "failed to evict aborted response"),
            }
            debug!(key = %key, "handler aborted, response not cached");
            return live.keep_alive(keep_alive).abort();
        }

        collector.finish().keep_alive(keep_alive)
    }

    /// Turns the cache and `handler` into a handler that can be routed.
    pub fn wrap<H>(self, handler: H) -> impl IntoHandler
    where
        H: IntoHandler,
    {
        let page = Arc::new(self);
        let handler = Arc::new(handler);
        move |ctx: Context| -> BoxResponse {
            let page = Arc::clone(&page);
            let handler = Arc::clone(&handler);
            Box::pin(async move { page.serve(ctx, handler.as_ref()).await })
        }
    }

    fn status_header(&self) -> Option<&str> {
        match self.header_mode {
            HeaderMode::Replay => Some(self.config.status_header()),
            HeaderMode::Omit => None,
        }
    }
}

/// A diagnostic header and the single value it must carry.
pub(crate) type Marker<'a> = Option<(&'a str, &'a str)>;

/// Writes a stored record to `sink`.
///
/// Stored headers are copied through `sanitizer` when one is given; otherwise
/// only status and body are written. The marker is set last.
pub(crate) fn replay<W>(
    sink: &mut W,
    record: &ResponseRecord,
    sanitizer: Option<&HeaderSanitizer>,
    marker: Marker<'_>,
) -> io::Result<()>
where
    W: ResponseWriter + ?Sized,
{
    if let Some(sanitizer) = sanitizer {
        sink.headers_mut().extend(&sanitizer.sanitize(&record.headers));
    }
    if let Some((name, value)) = marker {
        sink.headers_mut().set(name, value);
    }
    sink.write_status(record.status);
    write_body(sink, &record.body)
}

/// Writes a handler's finished response to `sink`.
///
/// The marker overrides any value the handler gave the same header.
pub(crate) fn forward<W>(sink: &mut W, response: &Response, marker: Marker<'_>) -> io::Result<()>
where
    W: ResponseWriter + ?Sized,
{
    sink.headers_mut().extend(response.headers());
    if let Some((name, value)) = marker {
        sink.headers_mut().set(name, value);
    }
    sink.write_status(response.status());
    write_body(sink, response.body_ref())
}

// Always issues at least one write so an empty body still counts as written.
fn write_body<W>(sink: &mut W, mut body: &[u8]) -> io::Result<()>
where
    W: ResponseWriter + ?Sized,
{
    loop {
        let n = sink.write(body)?;
        body = &body[n..];
        if body.is_empty() {
            return Ok(());
        }
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
    }
}

/// Caches `handler`'s responses, keyed by path and query, replaying headers.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use pagecache::cache::{MemoryStore, cache_page};
/// use pagecache::context::Context;
/// use pagecache::{Response, Router, StatusCode};
///
/// let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
/// let mut router = Router::new();
/// router.get(
///     "/ping",
///     cache_page(store, Duration::from_secs(3), |_ctx: Context| async {
///         Response::new(StatusCode::Ok).body("pong")
///     }),
/// );
/// ```
pub fn cache_page(
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    handler: impl IntoHandler,
) -> impl IntoHandler {
    CachePage::new(store, ttl).wrap(handler)
}

/// Like [`cache_page`], but every query string of a path shares one entry.
pub fn cache_page_without_query(
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    handler: impl IntoHandler,
) -> impl IntoHandler {
    CachePage::new(store, ttl).without_query().wrap(handler)
}

/// Like [`cache_page`], but only status and body are replayed.
pub fn cache_page_without_header(
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    handler: impl IntoHandler,
) -> impl IntoHandler {
    CachePage::new(store, ttl).without_header().wrap(handler)
}

/// Like [`cache_page`], with concurrent requests for one key served one at a time.
pub fn cache_page_atomic(
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    handler: impl IntoHandler,
) -> impl IntoHandler {
    CachePage::new(store, ttl).atomic().wrap(handler)
}
