//! cachefs-kv-store: the key-value cache boundary of cachefs.
//!
//! This is the narrow waist under the filesystem engine. Everything at this
//! level is opaque string keys and opaque bytes with an optional time to
//! live - no paths, no metadata, no notion of files.
//!
//! Backends:
//! - [`InMemoryCache`] - a process-local map with lazy expiry
//! - [`SharedCache`] - a cloneable, thread-safe handle to one `InMemoryCache`
//! - [`DiskCache`] - one file per key under a directory, shareable between
//!   processes
//!
//! # Example
//!
//! ```rust
//! use cachefs_kv_store::{CacheStore, KvError, SharedCache};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! fn remember(store: &mut dyn CacheStore, key: &str) -> Result<(), KvError> {
//!     store.set(key, Bytes::from_static(b"1"), Some(Duration::from_secs(60)))
//! }
//!
//! let mut cache = SharedCache::new();
//! remember(&mut cache, "seen").unwrap();
//! ```

pub use bytes::Bytes;

mod error;
mod in_memory;
mod local_disk;
mod traits;

pub use error::KvError;
pub use in_memory::{InMemoryCache, SharedCache};
pub use local_disk::DiskCache;
pub use traits::CacheStore;
