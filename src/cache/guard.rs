//! Serialization of cache misses.
//!
//! Without coordination, N concurrent first requests for one key all miss and all
//! run the handler. [`KeyLocks`] makes them queue instead: the first request
//! computes and stores the response, the rest find it in the store once they get
//! the lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Registry = DashMap<String, Arc<Mutex<()>>>;

/// Granularity of the lock taken around a cached handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockScope {
    /// Requests for the same cache key run one at a time; other keys are unaffected.
    #[default]
    Key,
    /// Every request to the route runs one at a time, whatever its key.
    Route,
}

/// A registry of locks for one protected route.
///
/// Per-key locks are created on first use and dropped from the registry when the
/// last holder releases them with nobody waiting, so the registry only holds keys
/// that are currently in flight.
#[derive(Clone)]
pub struct KeyLocks {
    scope: LockScope,
    registry: Arc<Registry>,
    route: Arc<Mutex<()>>,
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(LockScope::default())
    }
}

impl KeyLocks {
    pub fn new(scope: LockScope) -> Self {
        Self {
            scope,
            registry: Arc::new(DashMap::new()),
            route: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the configured scope.
    pub fn scope(&self) -> LockScope {
        self.scope
    }

    /// Waits for exclusive access to `key` (or to the whole route).
    ///
    /// The lock is held until the returned guard is dropped, which also happens
    /// while unwinding from a panicking handler.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        match self.scope {
            LockScope::Route => KeyGuard {
                key: None,
                registry: self.registry.clone(),
                guard: Some(self.route.clone().lock_owned().await),
            },
            LockScope::Key => {
                let lock = Arc::clone(
                    self.registry
                        .entry(key.to_owned())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .value(),
                );
                KeyGuard {
                    key: Some(key.to_owned()),
                    registry: self.registry.clone(),
                    guard: Some(lock.lock_owned().await),
                }
            }
        }
    }

    /// Returns the number of keys with a lock currently in the registry.
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }
}

/// Exclusive access obtained from [`KeyLocks::acquire`].
pub struct KeyGuard {
    key: Option<String>,
    registry: Arc<Registry>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Some(key) = &self.key {
            // Only the registry's own handle left: no holder, no waiter.
            self.registry
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}
