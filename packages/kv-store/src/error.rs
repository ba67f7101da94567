//! Error types for the cache store layer.
//!
//! Errors at this level are transport-focused. "No such key" is not an
//! error here - reads return `Ok(None)` - and nothing at this layer knows
//! about files or directories.

/// Errors raised by a [`CacheStore`](crate::CacheStore) backend.
#[derive(thiserror::Error, Debug)]
pub enum KvError {
    /// Filesystem I/O failure in a disk-backed store.
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The root directory of a disk-backed store is unusable.
    #[error("cache root {path} is invalid: {error}")]
    RootPathInvalid {
        path: std::path::PathBuf,
        error: std::io::Error,
    },

    /// A stored envelope could not be encoded or decoded.
    #[error("cache codec error for key '{key}': {message}")]
    Codec { key: String, message: String },

    /// A shared store's lock was poisoned by a panicking holder.
    #[error("cache store lock poisoned")]
    Poisoned,

    /// Failure reaching a remote cache. Backends that talk to a cache
    /// server over a network or IPC wrap their client errors here; the
    /// in-process and disk backends never produce it.
    #[error("cache transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl KvError {
    pub fn codec(key: &str, message: impl Into<String>) -> Self {
        KvError::Codec {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn transport(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        KvError::Transport(error.into())
    }
}
