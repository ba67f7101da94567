//! In-memory cache stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::{CacheStore, KvError};

struct Slot {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A process-local cache with per-key expiry.
///
/// Expired keys are evicted lazily, when they are next looked at, or in bulk
/// by [`InMemoryCache::purge_expired`].
///
/// # Example
///
/// ```rust
/// use cachefs_kv_store::{CacheStore, InMemoryCache};
/// use bytes::Bytes;
///
/// let mut cache = InMemoryCache::new();
/// cache.set("greeting", Bytes::from_static(b"hello"), None).unwrap();
/// assert_eq!(cache.get("greeting").unwrap(), Some(Bytes::from_static(b"hello")));
/// ```
#[derive(Default)]
pub struct InMemoryCache {
    slots: HashMap<String, Slot>,
}

impl InMemoryCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.values().filter(|s| !s.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` currently holds an unexpired value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| !slot.is_expired(Instant::now()))
    }

    /// Drop every expired key, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_expired(now));
        before - self.slots.len()
    }
}

impl CacheStore for InMemoryCache {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, KvError> {
        let expired = match self.slots.get(key) {
            Some(slot) => slot.is_expired(Instant::now()),
            None => return Ok(None),
        };

        if expired {
            self.slots.remove(key);
            return Ok(None);
        }
        Ok(self.slots.get(key).map(|slot| slot.value.clone()))
    }

    fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), KvError> {
        // A deadline past what `Instant` can represent never arrives.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.slots
            .insert(key.to_string(), Slot { value, expires_at });
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), KvError> {
        self.slots.remove(key);
        Ok(())
    }
}

/// A cloneable, thread-safe handle to one [`InMemoryCache`].
///
/// Every clone sees the same keys, so independent sessions on different
/// threads can contend for the same index and lock records.
#[derive(Clone, Default)]
pub struct SharedCache {
    inner: Arc<Mutex<InMemoryCache>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the underlying cache while holding its lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut InMemoryCache) -> R) -> Result<R, KvError> {
        let mut guard = self.inner.lock().map_err(|_| KvError::Poisoned)?;
        Ok(f(&mut guard))
    }
}

impl CacheStore for SharedCache {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, KvError> {
        self.with(|cache| cache.get(key))?
    }

    fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), KvError> {
        self.with(|cache| cache.set(key, value, ttl))?
    }

    fn delete(&mut self, key: &str) -> Result<(), KvError> {
        self.with(|cache| cache.delete(key))?
    }
}
