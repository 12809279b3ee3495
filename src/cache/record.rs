//! The stored form of a cached response.

use serde::{Deserialize, Serialize};

use super::store::StoreError;
use crate::http::{Headers, StatusCode};

/// A snapshot of one response: status, headers, and the complete body.
///
/// Records are written whole, so a hit always replays headers and body that
/// belonged to the same response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl ResponseRecord {
    pub fn new(status: StatusCode, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Encodes the record for byte-oriented backends.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a record produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] for malformed input or a status code this
    /// crate does not model.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
