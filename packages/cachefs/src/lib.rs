//! cachefs: a virtual filesystem whose only storage is a key-value cache.
//!
//! Files and directories live under paths such as `cache://docs/a.txt`.
//! File content is stored under its normalized path as the cache key; all
//! metadata lives in one index record, loaded when a [`Session`] starts and
//! written back when it ends. A second record acts as an advisory lock so
//! that sessions sharing a cache take turns with the index.
//!
//! Layers, bottom up:
//! - [`PathNormalizer`] - canonical index keys for raw paths
//! - [`Index`] / [`Entry`] - the path to metadata table
//! - the index lock - acquired and released by the session
//! - directory listings derived by prefix scan, walked with [`DirCursor`]
//! - buffered file streams, opened with an [`OpenMode`]
//! - [`Session`] - the public operations, plus [`Session::dispatch`] for
//!   hosts that speak in [`Call`]s and [`Reply`]s
//!
//! # Example
//!
//! ```rust
//! use cachefs::{OpenMode, Session, SessionConfig};
//! use cachefs_kv_store::SharedCache;
//!
//! let store = SharedCache::new();
//!
//! let mut session = Session::open(store.clone(), SessionConfig::default()).unwrap();
//! session.mkdir("/docs").unwrap();
//! let file = session.open_file("/docs/a.txt", OpenMode::WRITE).unwrap();
//! session.write(file, b"hello").unwrap();
//! session.close().unwrap();
//!
//! // A later session sees what the first one persisted.
//! let mut session = Session::open(store, SessionConfig::default()).unwrap();
//! assert_eq!(session.list_children("/docs"), vec!["a.txt".to_string()]);
//! assert_eq!(session.stat("/docs/a.txt").unwrap().size, 5);
//! ```
//!
//! # Limitations
//!
//! - The lock is advisory. Two sessions that see an absent or abandoned
//!   lock at the same moment both proceed, and the index persisted last
//!   wins.
//! - Renaming a directory is shallow: entries below it keep their old
//!   paths.

mod config;
mod dir;
mod dispatch;
mod error;
mod index;
mod lock;
mod ops;
mod path;
mod session;
mod stream;

pub use config::{
    SessionConfig, DEFAULT_INDEX_KEY, DEFAULT_LOCK_KEY, DEFAULT_SCHEME, DEFAULT_TIME_LIMIT_SECS,
};
pub use dir::DirCursor;
pub use dispatch::{Call, Reply, Whence};
pub use error::{Error, ErrorKind};
pub use index::{Entry, EntryKind, Index};
pub use ops::{Stat, DIRECTORY_MODE, FILE_MODE};
pub use path::PathNormalizer;
pub use session::{DirHandle, FileHandle, Session};
pub use stream::{OpenKind, OpenMode, MAX_FILE_SIZE};

// Re-export the store layer for convenience
pub use cachefs_kv_store::{CacheStore, DiskCache, InMemoryCache, KvError, SharedCache};
