//! The cache store trait.

use std::time::Duration;

use bytes::Bytes;

use crate::KvError;

/// A key-value cache: get/set/delete by string key, with optional expiry.
///
/// This is the only thing the filesystem engine knows about its backing
/// store. Keys are opaque strings and values are opaque bytes.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn CacheStore>`.
pub trait CacheStore: Send {
    /// Fetch the value stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The key is absent or has expired (not an error condition).
    /// * `Ok(Some(bytes))` - The stored value.
    /// * `Err(KvError)` - A transport or system error occurred.
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, KvError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// `ttl` of `None` means the value never expires.
    fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Remove `key`. Deleting an absent key succeeds.
    fn delete(&mut self, key: &str) -> Result<(), KvError>;
}

// Blanket implementations for references and boxes

impl<T: CacheStore + ?Sized> CacheStore for &mut T {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, KvError> {
        (*self).get(key)
    }

    fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), KvError> {
        (*self).set(key, value, ttl)
    }

    fn delete(&mut self, key: &str) -> Result<(), KvError> {
        (*self).delete(key)
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, KvError> {
        self.as_mut().get(key)
    }

    fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), KvError> {
        self.as_mut().set(key, value, ttl)
    }

    fn delete(&mut self, key: &str) -> Result<(), KvError> {
        self.as_mut().delete(key)
    }
}
