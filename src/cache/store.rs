//! Storage contract for cached responses and the in-process backend.
//!
//! The page cache only talks to storage through [`CacheStore`], so an in-memory
//! map, a file-backed store, or a network cache are interchangeable. Calls are
//! synchronous and may block on backend I/O.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;

use super::record::ResponseRecord;

/// Errors reported by a [`CacheStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live entry exists for the key. Expected on every first request.
    #[error("cache miss")]
    Miss,

    /// A conditional write (`add`/`replace`) found the key in the wrong state.
    #[error("item not stored")]
    NotStored,

    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Any other backend failure (connection loss, I/O, capacity).
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for [`StoreError::Miss`].
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Key-value storage for [`ResponseRecord`]s with per-entry expiration.
///
/// # Contract
///
/// - Implementations **must** be safe to share across tasks; concurrent writers
///   to one key resolve as last-write-wins.
/// - After `ttl` has elapsed, `get` **must** report [`StoreError::Miss`].
/// - A `ttl` of [`Duration::ZERO`] asks the backend for its default expiration.
pub trait CacheStore: Send + Sync {
    /// Fetches the live record for `key`.
    fn get(&self, key: &str) -> Result<ResponseRecord, StoreError>;

    /// Stores `record` under `key`, replacing any existing entry.
    fn set(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Stores `record` only if `key` has no live entry.
    ///
    /// Returns [`StoreError::NotStored`] when one exists.
    fn add(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Stores `record` only if `key` already has a live entry.
    ///
    /// Returns [`StoreError::NotStored`] when none exists.
    fn replace(&self, key: &str, record: &ResponseRecord, ttl: Duration)
    -> Result<(), StoreError>;

    /// Removes the entry for `key`. Returns [`StoreError::Miss`] if there was none.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every entry.
    fn flush(&self) -> Result<(), StoreError>;
}

struct Entry {
    bytes: Vec<u8>,
    // `None` when the ttl reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Thread-safe in-process [`CacheStore`].
///
/// Records are kept in their encoded form, exactly as a remote backend would
/// hold them, so every hit exercises the record codec. Expired entries are
/// dropped lazily on access and in bulk by [`purge_expired`](Self::purge_expired).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pagecache::cache::{CacheStore, MemoryStore, ResponseRecord};
/// use pagecache::{Headers, StatusCode};
///
/// let store = MemoryStore::new(Duration::from_secs(60));
/// let record = ResponseRecord::new(StatusCode::Ok, Headers::new(), "pong");
/// store.set("k", &record, Duration::from_secs(5)).unwrap();
/// assert_eq!(store.get("k").unwrap().body, b"pong");
/// ```
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    default_ttl: Duration,
}

impl MemoryStore {
    /// Creates an empty store whose entries default to `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| e.is_live(now)).count()
    }

    /// Returns `true` if no live entry exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    fn entry_for(&self, record: &ResponseRecord, ttl: Duration) -> Result<Entry, StoreError> {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        Ok(Entry {
            bytes: record.to_bytes()?,
            expires_at: Instant::now().checked_add(ttl),
        })
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<ResponseRecord, StoreError> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return ResponseRecord::from_bytes(&entry.bytes),
                Some(_) => {}
                None => return Err(StoreError::Miss),
            }
        }

        // Expired: drop it unless a writer refreshed it in the meantime.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Err(StoreError::Miss)
    }

    fn set(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError> {
        let entry = self.entry_for(record, ttl)?;
        self.entries.write().insert(key.to_owned(), entry);
        Ok(())
    }

    fn add(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError> {
        let entry = self.entry_for(record, ttl)?;
        let now = Instant::now();
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Err(StoreError::NotStored);
        }
        entries.insert(key.to_owned(), entry);
        Ok(())
    }

    fn replace(
        &self,
        key: &str,
        record: &ResponseRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let entry = self.entry_for(record, ttl)?;
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(existing) if existing.is_live(now) => {
                *existing = entry;
                Ok(())
            }
            _ => Err(StoreError::NotStored),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        match self.entries.write().remove(key) {
            Some(entry) if entry.is_live(now) => Ok(()),
            _ => Err(StoreError::Miss),
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, StatusCode};

    fn record(body: &str) -> ResponseRecord {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        ResponseRecord::new(StatusCode::Ok, headers, body)
    }

    #[test]
    fn get_on_empty_is_miss() {
        let store = MemoryStore::new(Duration::from_secs(60));
        assert!(store.get("nope").unwrap_err().is_miss());
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let rec = record("pong");
        store.set("k", &rec, Duration::from_secs(5)).unwrap();
        assert_eq!(store.get("k").unwrap(), rec);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_overwrites() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set("k", &record("one"), Duration::from_secs(5)).unwrap();
        store.set("k", &record("two"), Duration::from_secs(5)).unwrap();
        assert_eq!(store.get("k").unwrap().body, b"two");
    }

    #[test]
    fn expired_entry_is_miss() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set("k", &record("pong"), Duration::from_millis(20)).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get("k").unwrap_err().is_miss());
        assert!(store.is_empty());
    }

    #[test]
    fn zero_ttl_uses_default() {
        let store = MemoryStore::new(Duration::from_millis(20));
        store.set("k", &record("pong"), Duration::ZERO).unwrap();
        assert!(store.get("k").is_ok());
        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get("k").is_err());
    }

    #[test]
    fn unbounded_ttl_never_expires() {
        let store = MemoryStore::new(Duration::MAX);
        store.set("max", &record("pong"), Duration::MAX).unwrap();
        store.add("default", &record("pong"), Duration::ZERO).unwrap();
        store.replace("max", &record("again"), Duration::MAX).unwrap();
        assert_eq!(store.get("max").unwrap().body, b"again");
        assert!(store.get("default").is_ok());
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn add_only_when_absent() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.add("k", &record("first"), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            store.add("k", &record("second"), Duration::from_secs(5)),
            Err(StoreError::NotStored)
        ));
        assert_eq!(store.get("k").unwrap().body, b"first");
    }

    #[test]
    fn add_over_expired_entry() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set("k", &record("old"), Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        store.add("k", &record("new"), Duration::from_secs(5)).unwrap();
        assert_eq!(store.get("k").unwrap().body, b"new");
    }

    #[test]
    fn replace_only_when_present() {
        let store = MemoryStore::new(Duration::from_secs(60));
        assert!(matches!(
            store.replace("k", &record("x"), Duration::from_secs(5)),
            Err(StoreError::NotStored)
        ));
        store.set("k", &record("a"), Duration::from_secs(5)).unwrap();
        store.replace("k", &record("b"), Duration::from_secs(5)).unwrap();
        assert_eq!(store.get("k").unwrap().body, b"b");
    }

    #[test]
    fn delete_reports_miss_when_absent() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set("k", &record("a"), Duration::from_secs(5)).unwrap();
        store.delete("k").unwrap();
        assert!(store.delete("k").unwrap_err().is_miss());
        assert!(store.get("k").unwrap_err().is_miss());
    }

    #[test]
    fn purge_and_flush() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.set("short", &record("a"), Duration::from_millis(10)).unwrap();
        store.set("long", &record("b"), Duration::from_secs(5)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        store.flush().unwrap();
        assert!(store.is_empty());
    }
}
