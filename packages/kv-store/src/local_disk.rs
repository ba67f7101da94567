use std::time::Duration;
use std::{fs, io, path};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{CacheStore, KvError};

const TMP_SUFFIX: &str = ".tmp";

/// Longest encoded key used verbatim as a file name. Leaves room for the
/// temp-file suffix under the usual 255-byte name limit.
const MAX_PLAIN_NAME_LEN: usize = 200;

/// Marks a shortened file name; never produced by URL-safe base64.
const SHORTENED_PREFIX: char = '~';

/// On-disk layout of one cached value.
#[derive(Serialize, Deserialize)]
struct Envelope {
    /// The key this value was stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    /// Unix seconds after which the value is gone; `None` never expires.
    expires_at: Option<i64>,
    /// Base64 of the value bytes.
    data: String,
}

impl Envelope {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A cache persisted as one file per key under a root directory.
///
/// Several processes pointed at the same root share one keyspace, which is
/// what lets independent filesystem sessions coordinate through it. File
/// names are the URL-safe base64 of the key, so keys containing `/` or `:`
/// stay flat. Keys whose encoding would be too long for a file name are
/// stored under `~` plus the URL-safe base64 of their SHA-256 instead.
pub struct DiskCache {
    root: path::PathBuf,
}

impl DiskCache {
    pub fn new(root: path::PathBuf) -> Result<DiskCache, KvError> {
        let attr = fs::metadata(&root).map_err(|error| KvError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;

        if !attr.is_dir() {
            return Err(KvError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root path must be a directory."),
            });
        }

        if attr.permissions().readonly() {
            return Err(KvError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root directory must be writable"),
            });
        }

        match root.canonicalize() {
            Ok(root) => Ok(DiskCache { root }),
            Err(error) => Err(KvError::RootPathInvalid { path: root, error }),
        }
    }

    /// Create the root directory (and parents) first if it is missing.
    pub fn create(root: path::PathBuf) -> Result<DiskCache, KvError> {
        fs::create_dir_all(&root).map_err(|error| KvError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;
        Self::new(root)
    }

    pub fn root(&self) -> &path::Path {
        &self.root
    }

    fn key_to_file_path(&self, key: &str) -> path::PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
        if encoded.len() <= MAX_PLAIN_NAME_LEN {
            return self.root.join(encoded);
        }

        let digest = Sha256::digest(key.as_bytes());
        let mut name = String::from(SHORTENED_PREFIX);
        name.push_str(&URL_SAFE_NO_PAD.encode(digest));
        self.root.join(name)
    }

    fn read_envelope(file_path: &path::Path, key: &str) -> Result<Option<Envelope>, KvError> {
        let raw = match fs::read(file_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let envelope: Envelope =
            serde_json::from_slice(&raw).map_err(|err| KvError::codec(key, err.to_string()))?;
        Ok(Some(envelope))
    }

    fn remove_file(file_path: &path::Path) -> Result<(), KvError> {
        match fs::remove_file(file_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every expired value under the root, returning how many were
    /// removed. Files that do not decode as envelopes are left alone.
    pub fn purge_expired(&self) -> Result<usize, KvError> {
        let now = chrono::Utc::now().timestamp();
        let mut removed = 0;

        for entry in walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let file_path = entry.path();
            if file_path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TMP_SUFFIX))
            {
                continue;
            }

            let label = file_path.display().to_string();
            match Self::read_envelope(file_path, &label) {
                Ok(Some(envelope)) if envelope.is_expired(now) => {
                    log::debug!("Purging expired {}...", label);
                    Self::remove_file(file_path)?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(KvError::Codec { .. }) => {
                    log::debug!("Skipping undecodable {}", label);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(removed)
    }
}

impl CacheStore for DiskCache {
    fn get(&mut self, key: &str) -> Result<Option<Bytes>, KvError> {
        let file_path = self.key_to_file_path(key);
        log::debug!("Reading {}...", file_path.display());

        let Some(envelope) = Self::read_envelope(&file_path, key)? else {
            return Ok(None);
        };

        if envelope.key.as_deref().is_some_and(|stored| stored != key) {
            log::debug!("Ignoring {} stored under another key", file_path.display());
            return Ok(None);
        }

        if envelope.is_expired(chrono::Utc::now().timestamp()) {
            Self::remove_file(&file_path)?;
            return Ok(None);
        }

        let data = STANDARD
            .decode(envelope.data.as_bytes())
            .map_err(|err| KvError::codec(key, format!("invalid base64 payload: {}", err)))?;
        Ok(Some(Bytes::from(data)))
    }

    fn set(&mut self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), KvError> {
        let file_path = self.key_to_file_path(key);
        log::debug!("Writing {}...", file_path.display());

        let ttl_secs = ttl.map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        let envelope = Envelope {
            key: Some(key.to_string()),
            expires_at: ttl_secs.map(|secs| chrono::Utc::now().timestamp().saturating_add(secs)),
            data: STANDARD.encode(&value),
        };
        let encoded =
            serde_json::to_vec(&envelope).map_err(|err| KvError::codec(key, err.to_string()))?;

        // Write-then-rename so a concurrent reader never sees a torn file.
        let mut tmp_path = file_path.clone().into_os_string();
        tmp_path.push(format!(".{}{}", std::process::id(), TMP_SUFFIX));
        let tmp_path = path::PathBuf::from(tmp_path);
        fs::write(&tmp_path, encoded)?;
        fs::rename(&tmp_path, &file_path)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), KvError> {
        let file_path = self.key_to_file_path(key);
        log::debug!("Deleting {}...", file_path.display());
        Self::remove_file(&file_path)
    }
}
