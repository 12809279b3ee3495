//! Outgoing responses: a builder for handlers, the [`ResponseWriter`] sink the
//! cache writes through, and HTTP/1.1 serialization.

use std::io;

use bytes::{BufMut, BytesMut};
use tracing::warn;

use super::{Headers, ResponseWriter, StatusCode};

/// A response under construction.
///
/// ```
/// use pagecache::{Response, StatusCode};
///
/// let wire = Response::new(StatusCode::Ok).header("X-Id", "7").body("hi").into_bytes();
/// assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\nX-Id: 7\r\n"));
/// assert!(wire.ends_with(b"Content-Length: 2\r\n\r\nhi"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
    committed: bool,
    aborted: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
            committed: false,
            aborted: false,
        }
    }

    /// `value` serialized as the body, with `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Whatever `serde_json` reports for `value`.
    pub fn json<T>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error>
    where
        T: serde::Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .header("Content-Type", "application/json")
            .body_bytes(body))
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Same as [`header`](Self::header) for a response already owned by a
    /// middleware.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn body(self, body: impl Into<String>) -> Self {
        self.body_bytes(body.into())
    }

    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Flags the response as incomplete. It is still sent, but nothing that
    /// remembers responses may keep it.
    #[must_use]
    pub fn abort(mut self) -> Self {
        self.aborted = true;
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &[u8] {
        &self.body
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Encodes status line, headers and body.
    ///
    /// A non-empty body without a content type is labelled as UTF-8 text.
    /// `Connection` is rewritten from the keep-alive flag and `Content-Length`
    /// always closes the head.
    pub fn into_bytes(mut self) -> BytesMut {
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers
            .set("Connection", if self.keep_alive { "keep-alive" } else { "close" });
        self.headers.remove("content-length");

        let mut head = format!("HTTP/1.1 {}\r\n", self.status);
        for (name, value) in self.headers.iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));

        let mut wire = BytesMut::with_capacity(head.len() + self.body.len());
        wire.put_slice(head.as_bytes());
        wire.put_slice(&self.body);
        wire
    }
}

impl ResponseWriter for Response {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.committed {
            warn!(
                current = self.status.as_u16(),
                ignored = status.as_u16(),
                "status already written"
            );
            return;
        }
        self.status = status;
        self.committed = true;
    }

    fn is_written(&self) -> bool {
        self.committed
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.committed = true;
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}
