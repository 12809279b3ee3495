//! Output sink abstraction for responses that are assembled write by write.
//!
//! [`ResponseWriter`] is the surface the page cache decorates: a status that can
//! be written once, a mutable header map, and body writes that may fail. The
//! in-memory [`Response`](super::Response) is the sink every handler ultimately produces.

use std::io;

use super::{Headers, StatusCode};

/// A response sink receiving status, headers, and body bytes in order.
///
/// The status is write-once: after [`write_status`](Self::write_status) or the
/// first body write the status is committed, and further status writes are
/// ignored.
pub trait ResponseWriter: Send {
    /// Returns the status that has been written, or the default if none was.
    fn status(&self) -> StatusCode;

    /// Writes the status line. Ignored when the status is already committed.
    fn write_status(&mut self, status: StatusCode);

    /// Returns `true` once the status has been committed.
    fn is_written(&self) -> bool;

    /// Returns the current header map.
    fn headers(&self) -> &Headers;

    /// Returns the header map for modification.
    fn headers_mut(&mut self) -> &mut Headers;

    /// Appends `data` to the body, returning the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error when the bytes could not be delivered.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Appends UTF-8 text to the body.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    fn write_str(&mut self, data: &str) -> io::Result<usize> {
        self.write(data.as_bytes())
    }
}
