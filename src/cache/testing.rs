//! Store doubles and request helpers shared by the cache tests.

use std::time::Duration;

use super::{CacheStore, MemoryStore, ResponseRecord, StoreError};
use crate::http::Request;

pub(crate) fn get(target: &str) -> Request {
    let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let (request, _) = Request::parse(raw.as_bytes()).unwrap();
    request
}

/// Every operation fails with a backend error.
pub(crate) struct BrokenStore;

impl CacheStore for BrokenStore {
    fn get(&self, _: &str) -> Result<ResponseRecord, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    fn set(&self, _: &str, _: &ResponseRecord, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    fn add(&self, _: &str, _: &ResponseRecord, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    fn replace(&self, _: &str, _: &ResponseRecord, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
    fn flush(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

/// A [`MemoryStore`] whose writes land a few milliseconds late, widening the
/// window in which concurrent misses race.
pub(crate) struct DelayStore {
    inner: MemoryStore,
    delay: Duration,
}

impl DelayStore {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(Duration::from_secs(60)),
            delay,
        }
    }
}

impl CacheStore for DelayStore {
    fn get(&self, key: &str) -> Result<ResponseRecord, StoreError> {
        self.inner.get(key)
    }
    fn set(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError> {
        std::thread::sleep(self.delay);
        self.inner.set(key, record, ttl)
    }
    fn add(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError> {
        std::thread::sleep(self.delay);
        self.inner.add(key, record, ttl)
    }
    fn replace(&self, key: &str, record: &ResponseRecord, ttl: Duration) -> Result<(), StoreError> {
        self.inner.replace(key, record, ttl)
    }
    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
    fn flush(&self) -> Result<(), StoreError> {
        self.inner.flush()
    }
}

/// Holds one record whose bytes no longer decode.
pub(crate) struct CorruptStore;

impl CacheStore for CorruptStore {
    fn get(&self, _: &str) -> Result<ResponseRecord, StoreError> {
        ResponseRecord::from_bytes(br#"{"status":200,"headers":"#)
    }
    fn set(&self, _: &str, _: &ResponseRecord, _: Duration) -> Result<(), StoreError> {
        Ok(())
    }
    fn add(&self, _: &str, _: &ResponseRecord, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::NotStored)
    }
    fn replace(&self, _: &str, _: &ResponseRecord, _: Duration) -> Result<(), StoreError> {
        Ok(())
    }
    fn delete(&self, _: &str) -> Result<(), StoreError> {
        Ok(())
    }
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
