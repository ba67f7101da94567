//! Path-level operations: stat, unlink, mkdir, rmdir, rename.

use serde::{Deserialize, Serialize};

use cachefs_kv_store::CacheStore;

use crate::dir::list_children;
use crate::index::{unix_now, Entry, EntryKind};
use crate::{Error, Session};

/// `S_IFDIR | 0777`
pub const DIRECTORY_MODE: u32 = 0o040777;
/// `S_IFREG | 0666`
pub const FILE_MODE: u32 = 0o100666;

/// Result of [`Session::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub kind: EntryKind,
    /// Type and permission bits, fixed per kind.
    pub mode: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

impl<S: CacheStore> Session<S> {
    /// Describe `path`. Unset timestamps are reported as now.
    ///
    /// For files the content is checked too; a file whose content has left
    /// the cache is purged and reported as not found.
    pub fn stat(&mut self, path: &str) -> Result<Stat, Error> {
        let key = self.paths.normalize(path);
        let now = unix_now();

        if self.paths.is_root(&key) {
            return Ok(Stat {
                kind: EntryKind::Directory,
                mode: DIRECTORY_MODE,
                size: 0,
                atime: now,
                mtime: now,
                ctime: now,
            });
        }

        let entry = self
            .index
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(&key))?;

        let (mode, size) = match entry.kind {
            EntryKind::Directory => (DIRECTORY_MODE, 0),
            EntryKind::File => {
                let content = self.fetch_content(&key)?;
                (FILE_MODE, entry.size.unwrap_or(content.len() as u64))
            }
        };

        Ok(Stat {
            kind: entry.kind,
            mode,
            size,
            atime: entry.atime.unwrap_or(now),
            mtime: entry.mtime.unwrap_or(now),
            ctime: entry.ctime.unwrap_or(now),
        })
    }

    /// Whether `path` names the root or an index entry.
    pub fn exists(&self, path: &str) -> bool {
        let key = self.paths.normalize(path);
        self.paths.is_root(&key) || self.index.contains(&key)
    }

    /// Remove a file's content and entry. Directories need [`Session::rmdir`].
    pub fn unlink(&mut self, path: &str) -> Result<(), Error> {
        let key = self.paths.normalize(path);
        if self.is_directory(&key) {
            return Err(Error::invalid_operation(format!(
                "{} is a directory, use rmdir",
                key
            )));
        }
        if !self.index.is_file(&key) {
            return Err(Error::not_found(&key));
        }

        self.store.delete(&key)?;
        self.index.remove(&key);
        tracing::debug!(path = %key, "unlinked file");
        Ok(())
    }

    /// Create `path` and any missing ancestors.
    ///
    /// An existing directory is a success. Creation walks upward from the
    /// target until it meets an existing directory or the root; if it meets
    /// a file instead, nothing is created.
    pub fn mkdir(&mut self, path: &str) -> Result<(), Error> {
        let key = self.paths.normalize(path);
        if self.is_directory(&key) {
            return Ok(());
        }
        if self.index.is_file(&key) {
            return Err(Error::invalid_operation(format!("{} is a file", key)));
        }

        let mut missing = Vec::new();
        let mut current = key;
        while !self.is_directory(&current) {
            if self.index.is_file(&current) {
                return Err(Error::invalid_parent(missing.pop().unwrap_or(current)));
            }
            let parent = self.paths.parent(&current);
            missing.push(current);
            current = parent;
        }

        let now = unix_now();
        for dir in missing {
            tracing::debug!(path = %dir, "created directory");
            self.index.insert(dir, Entry::directory(now));
        }
        Ok(())
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str) -> Result<(), Error> {
        let key = self.paths.normalize(path);
        if !self.index.is_dir(&key) {
            return Err(Error::not_found(&key));
        }
        if !list_children(&self.index, &self.paths.child_prefix(&key)).is_empty() {
            return Err(Error::DirectoryNotEmpty { path: key });
        }

        self.index.remove(&key);
        tracing::debug!(path = %key, "removed directory");
        Ok(())
    }

    /// Move `from` to `to`.
    ///
    /// Files move with their content and metadata. Directories move
    /// shallowly: only the directory's own entry is replaced, so anything
    /// that lived under the old path stays under the old path.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), Error> {
        let from_key = self.paths.normalize(from);
        let to_key = self.paths.normalize(to);

        let Some(entry) = self.index.get(&from_key).cloned() else {
            return Err(Error::not_found(&from_key));
        };
        if !self.is_directory(&self.paths.parent(&to_key)) {
            return Err(Error::invalid_parent(&to_key));
        }
        if from_key == to_key {
            return Ok(());
        }
        if self.paths.is_root(&to_key) {
            return Err(Error::invalid_operation("cannot rename onto the root"));
        }

        match entry.kind {
            EntryKind::File => {
                if self.index.is_dir(&to_key) {
                    return Err(Error::invalid_operation(format!(
                        "cannot replace directory {} with a file",
                        to_key
                    )));
                }

                let content = self.fetch_content(&from_key)?;
                self.store.set(&to_key, content, self.config.file_ttl())?;
                self.store.delete(&from_key)?;
                self.index.remove(&from_key);
                self.index.insert(to_key.clone(), entry);
            }
            EntryKind::Directory => {
                if self.index.is_file(&to_key) {
                    return Err(Error::invalid_operation(format!(
                        "cannot replace file {} with a directory",
                        to_key
                    )));
                }

                self.index.remove(&from_key);
                self.index.insert(to_key.clone(), Entry::directory(unix_now()));
            }
        }

        tracing::debug!(from = %from_key, to = %to_key, "renamed");
        Ok(())
    }
}
