//! The path index: one metadata row per file or directory, persisted as a
//! single JSON record in the cache.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use cachefs_kv_store::CacheStore;

use crate::Error;

/// Current wall-clock time in Unix seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata for one filesystem object.
///
/// Timestamps are Unix seconds and stay unset until the object has been
/// touched in the corresponding way. `size` is only kept for files; when it
/// is missing it is recomputed from the stored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Entry {
    pub fn directory(now: i64) -> Self {
        Self {
            kind: EntryKind::Directory,
            ctime: Some(now),
            mtime: Some(now),
            atime: None,
            size: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Mapping from normalized path to [`Entry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    entries: HashMap<String, Entry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the index stored under `key`.
    ///
    /// A missing record yields an empty index, and so does a record that no
    /// longer decodes; the latter is logged since everything it described is
    /// now unreachable.
    pub fn load<S: CacheStore + ?Sized>(store: &mut S, key: &str) -> Result<Self, Error> {
        let Some(raw) = store.get(key)? else {
            tracing::debug!(key, "no stored index, starting empty");
            return Ok(Self::new());
        };

        match serde_json::from_slice::<Index>(&raw) {
            Ok(index) => {
                tracing::debug!(key, entries = index.len(), "loaded index");
                Ok(index)
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "stored index is malformed, starting empty");
                Ok(Self::new())
            }
        }
    }

    /// Write the whole index under `key`, without expiry.
    pub fn persist<S: CacheStore + ?Sized>(&self, store: &mut S, key: &str) -> Result<(), Error> {
        let encoded = serde_json::to_vec(self).map_err(|err| {
            Error::invalid_operation(format!("failed to encode index: {}", err))
        })?;
        store.set(key, Bytes::from(encoded), None)?;
        tracing::debug!(key, entries = self.len(), "persisted index");
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.entries.get_mut(path)
    }

    pub fn insert(&mut self, path: String, entry: Entry) -> Option<Entry> {
        self.entries.insert(path, entry)
    }

    pub fn remove(&mut self, path: &str) -> Option<Entry> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.get(path).is_some_and(Entry::is_dir)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.get(path).is_some_and(Entry::is_file)
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachefs_kv_store::InMemoryCache;

    fn file_entry(size: u64) -> Entry {
        Entry {
            kind: EntryKind::File,
            ctime: Some(1),
            mtime: Some(2),
            atime: Some(3),
            size: Some(size),
        }
    }

    #[test]
    fn entry_json_shape() {
        let json = serde_json::to_value(Entry::directory(42)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "directory", "ctime": 42, "mtime": 42})
        );
    }

    #[test]
    fn entry_without_timestamps_decodes() {
        let entry: Entry = serde_json::from_str(r#"{"type": "file"}"#).unwrap();
        assert!(entry.is_file());
        assert_eq!(entry.size, None);
        assert_eq!(entry.ctime, None);
    }

    #[test]
    fn load_missing_is_empty() {
        let mut store = InMemoryCache::new();
        let index = Index::load(&mut store, "idx").unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn load_malformed_is_empty() {
        let mut store = InMemoryCache::new();
        store
            .set("idx", Bytes::from_static(b"{not json"), None)
            .unwrap();
        let index = Index::load(&mut store, "idx").unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn persist_then_load() {
        let mut store = InMemoryCache::new();
        let mut index = Index::new();
        index.insert("cache://d".to_string(), Entry::directory(7));
        index.insert("cache://d/f".to_string(), file_entry(5));

        index.persist(&mut store, "idx").unwrap();
        let loaded = Index::load(&mut store, "idx").unwrap();

        assert_eq!(loaded, index);
        assert!(loaded.is_dir("cache://d"));
        assert!(loaded.is_file("cache://d/f"));
        assert!(!loaded.is_dir("cache://d/f"));
    }

    #[test]
    fn insert_replaces_and_remove_returns() {
        let mut index = Index::new();
        assert!(index.insert("k".to_string(), file_entry(1)).is_none());
        assert_eq!(
            index.insert("k".to_string(), file_entry(2)),
            Some(file_entry(1))
        );
        assert_eq!(index.remove("k"), Some(file_entry(2)));
        assert!(!index.contains("k"));
    }
}
