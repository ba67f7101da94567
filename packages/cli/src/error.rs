use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Fs(#[from] cachefs::Error),

    #[error("cache store error: {0}")]
    Store(#[from] cachefs::KvError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no cache directory given and no user cache directory found; pass --cache-dir")]
    NoCacheDir,
}
