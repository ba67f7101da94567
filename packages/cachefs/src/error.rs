//! Error types for the filesystem engine.

use serde::{Deserialize, Serialize};

use cachefs_kv_store::KvError;

/// Errors returned by filesystem operations.
///
/// None of these end the session: after a failed call the session keeps
/// serving requests against the same index.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No such file or directory, including a file whose content has
    /// vanished from the cache.
    #[error("no such file or directory: {path}")]
    NotFound { path: String },

    /// The directory that should contain `path` does not exist.
    #[error("parent directory of {path} does not exist")]
    InvalidParent { path: String },

    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: String },

    /// The request is not valid for the target (unlink on a directory,
    /// unsupported open mode, stale handle, ...).
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// The backing cache failed.
    #[error("cache store error: {0}")]
    Store(#[from] KvError),
}

/// Serializable discriminant of [`Error`], used in dispatch replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidParent,
    DirectoryNotEmpty,
    InvalidOperation,
    Store,
}

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    pub fn invalid_parent(path: impl Into<String>) -> Self {
        Error::InvalidParent { path: path.into() }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::InvalidParent { .. } => ErrorKind::InvalidParent,
            Error::DirectoryNotEmpty { .. } => ErrorKind::DirectoryNotEmpty,
            Error::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Error::Store(_) => ErrorKind::Store,
        }
    }
}
