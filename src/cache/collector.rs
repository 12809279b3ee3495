//! Write-intercepting response sink used on cache misses.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, warn};

use super::{CacheStore, HeaderSanitizer, ResponseRecord};
use crate::http::{Headers, ResponseWriter, StatusCode};

/// Decorates a [`ResponseWriter`] so the response passing through it is cached.
///
/// Every status and body write is forwarded to the wrapped sink first. Bytes the
/// sink accepted are accumulated in a per-request buffer, and
/// [`finish`](Self::finish) stores the complete response once, provided a body
/// was written and the status is below 300. Store failures are logged and never
/// reach the caller; sink failures are returned unchanged.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use pagecache::cache::{CacheStore, HeaderSanitizer, MemoryStore, ResponseCollector};
/// use pagecache::http::ResponseWriter;
/// use pagecache::{Response, StatusCode};
///
/// let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
/// let mut collector = ResponseCollector::new(
///     Response::new(StatusCode::Ok),
///     store.clone(),
///     "pages:/hello",
///     Duration::from_secs(3),
///     HeaderSanitizer::default(),
/// );
/// collector.write(b"hello ").unwrap();
/// collector.write(b"world").unwrap();
/// let response = collector.finish();
///
/// assert_eq!(response.body_ref(), b"hello world");
/// assert_eq!(store.get("pages:/hello").unwrap().body, b"hello world");
/// ```
pub struct ResponseCollector<W: ResponseWriter> {
    inner: W,
    store: Arc<dyn CacheStore>,
    key: String,
    ttl: Duration,
    sanitizer: HeaderSanitizer,
    status: Option<StatusCode>,
    // A body write reached the sink; nothing is stored without one.
    written: bool,
    body: BytesMut,
}

impl<W: ResponseWriter> ResponseCollector<W> {
    pub fn new(
        inner: W,
        store: Arc<dyn CacheStore>,
        key: impl Into<String>,
        ttl: Duration,
        sanitizer: HeaderSanitizer,
    ) -> Self {
        Self {
            inner,
            store,
            key: key.into(),
            ttl,
            sanitizer,
            status: None,
            written: false,
            body: BytesMut::new(),
        }
    }

    /// Returns the key the response will be stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the body accumulated so far.
    pub fn buffered(&self) -> &[u8] {
        &self.body
    }

    /// Completes the response: stores it if cacheable and returns the wrapped sink.
    pub fn finish(self) -> W {
        if !self.written {
            return self.inner;
        }

        let status = self.status();
        if !status.is_cacheable() {
            debug!(key = %self.key, status = status.as_u16(), "response not cacheable");
            return self.inner;
        }

        let record = ResponseRecord::new(
            status,
            self.sanitizer.sanitize(self.inner.headers()),
            self.body.to_vec(),
        );
        match self.store.set(&self.key, &record, self.ttl) {
            Ok(()) => debug!(key = %self.key, bytes = record.body.len(), "response cached"),
            Err(e) => warn!(key = %self.key, error = %e, "failed to cache response"),
        }
        self.inner
    }

    /// Returns the wrapped sink without storing anything.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ResponseWriter> ResponseWriter for ResponseCollector<W> {
    fn status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.inner.status())
    }

    fn write_status(&mut self, status: StatusCode) {
        self.inner.write_status(status);
        // Mirror what the sink committed; a late second status is dropped there.
        self.status = Some(self.inner.status());
    }

    fn is_written(&self) -> bool {
        self.inner.is_written()
    }

    fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(data)?;
        self.written = true;
        self.body.extend_from_slice(&data[..n]);
        Ok(n)
    }

    /// Text writes replace the buffered body instead of extending it.
    fn write_str(&mut self, data: &str) -> io::Result<usize> {
        let n = self.inner.write_str(data)?;
        self.written = true;
        self.body.clear();
        self.body.extend_from_slice(&data.as_bytes()[..n]);
        Ok(n)
    }
}
