//! Sessions: one lock-holding lifetime over the index, plus the open files
//! and directory cursors created during it.

use std::collections::HashMap;
use std::io::SeekFrom;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use cachefs_kv_store::CacheStore;

use crate::dir::{list_children, DirCursor};
use crate::index::{unix_now, Entry, EntryKind, Index};
use crate::lock::IndexLock;
use crate::stream::{FileStream, OpenKind, OpenMode};
use crate::{Error, PathNormalizer, SessionConfig};

/// Opaque reference to an open file within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(pub u64);

/// Opaque reference to an open directory cursor within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirHandle(pub u64);

/// An exclusive (advisory) claim on the index of one cache store.
///
/// [`Session::open`] waits for the lock and loads the index;
/// [`Session::close`] persists the index and releases the lock. A session
/// that is dropped without `close` does the same on a best-effort basis,
/// logging instead of returning failures.
///
/// Every path argument is normalized first, so `"/d/f.txt"`, `"d//f.txt"`
/// and `"cache://d/f.txt"` all name the same file.
///
/// # Example
///
/// ```rust
/// use cachefs::{OpenMode, Session, SessionConfig};
/// use cachefs_kv_store::InMemoryCache;
///
/// let mut store = InMemoryCache::new();
/// let mut session = Session::open(&mut store, SessionConfig::default()).unwrap();
///
/// session.mkdir("/d").unwrap();
/// let file = session.open_file("/d/f.txt", OpenMode::WRITE).unwrap();
/// session.write(file, b"hi").unwrap();
/// session.close_file(file).unwrap();
///
/// let file = session.open_file("/d/f.txt", OpenMode::READ).unwrap();
/// assert_eq!(session.read(file, 16).unwrap(), b"hi");
/// session.close().unwrap();
/// ```
pub struct Session<S: CacheStore> {
    pub(crate) store: S,
    pub(crate) config: SessionConfig,
    pub(crate) paths: PathNormalizer,
    pub(crate) index: Index,
    lock: IndexLock,
    streams: HashMap<u64, FileStream>,
    dirs: HashMap<u64, DirCursor>,
    next_handle: u64,
    finished: bool,
}

impl<S: CacheStore> Session<S> {
    /// Acquire the index lock on `store` and load the index.
    pub fn open(mut store: S, config: SessionConfig) -> Result<Self, Error> {
        config.validate()?;

        let mut lock = IndexLock::acquire(&mut store, &config)?;
        let index = match Index::load(&mut store, &config.index_key) {
            Ok(index) => index,
            Err(err) => {
                if let Err(release_err) = lock.release(&mut store) {
                    tracing::warn!(error = %release_err, "failed to release lock after load failure");
                }
                return Err(err);
            }
        };

        Ok(Self {
            paths: PathNormalizer::new(&config.scheme),
            store,
            config,
            index,
            lock,
            streams: HashMap::new(),
            dirs: HashMap::new(),
            next_handle: 1,
            finished: false,
        })
    }

    /// Flush open files, persist the index and release the lock.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn close(mut self) -> Result<(), Error> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), Error> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let mut first_err: Option<Error> = None;

        let mut handles: Vec<u64> = self.streams.keys().copied().collect();
        handles.sort_unstable();
        for id in handles {
            if let Err(err) = self.close_file(FileHandle(id)) {
                tracing::warn!(handle = id, error = %err, "failed to flush file at session end");
                first_err.get_or_insert(err);
            }
        }
        self.dirs.clear();

        if let Err(err) = self.index.persist(&mut self.store, &self.config.index_key) {
            tracing::warn!(error = %err, "failed to persist index at session end");
            first_err.get_or_insert(err);
        }

        if let Err(err) = self.lock.release(&mut self.store) {
            tracing::warn!(error = %err, "failed to release index lock");
            first_err.get_or_insert(err);
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn paths(&self) -> &PathNormalizer {
        &self.paths
    }

    /// Canonical index key for `raw`.
    pub fn normalize(&self, raw: &str) -> String {
        self.paths.normalize(raw)
    }

    pub fn holds_lock(&self) -> bool {
        self.lock.is_held()
    }

    fn allocate_handle(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    /// Fetch the content of the file entry at `key`.
    ///
    /// A file entry whose content has left the cache is stale: it is
    /// removed from the index and reported as not found.
    pub(crate) fn fetch_content(&mut self, key: &str) -> Result<Bytes, Error> {
        if !self.index.is_file(key) {
            return Err(Error::not_found(key));
        }

        match self.store.get(key)? {
            Some(content) => Ok(content),
            None => {
                tracing::warn!(path = key, "file content missing from cache, purging stale entry");
                self.index.remove(key);
                Err(Error::not_found(key))
            }
        }
    }

    /// Whether `key` is the root or a directory entry.
    pub(crate) fn is_directory(&self, key: &str) -> bool {
        self.paths.is_root(key) || self.index.is_dir(key)
    }

    // ---------------------------------------------------------------------
    // Files
    // ---------------------------------------------------------------------

    /// Open `path` with an fopen-style mode.
    ///
    /// Reading modes need an existing file; `w` always succeeds, and nothing
    /// reaches the cache until the file is flushed or closed.
    pub fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle, Error> {
        let key = self.paths.normalize(path);
        if self.is_directory(&key) {
            return Err(Error::invalid_operation(format!("{} is a directory", key)));
        }

        let (content, dirty) = match mode.kind {
            OpenKind::Read => {
                let content = self.fetch_content(&key)?;
                if let Some(entry) = self.index.get_mut(&key) {
                    entry.atime = Some(unix_now());
                }
                (content.to_vec(), false)
            }
            OpenKind::Write => (Vec::new(), true),
            OpenKind::Exclusive => match self.fetch_content(&key) {
                Ok(_) => {
                    return Err(Error::invalid_operation(format!("{} already exists", key)));
                }
                Err(Error::NotFound { .. }) => (Vec::new(), true),
                Err(err) => return Err(err),
            },
            OpenKind::Append | OpenKind::Create => match self.fetch_content(&key) {
                Ok(content) => (content.to_vec(), false),
                Err(Error::NotFound { .. }) => (Vec::new(), true),
                Err(err) => return Err(err),
            },
        };

        let id = self.allocate_handle();
        tracing::debug!(path = %key, mode = %mode, handle = id, "opened file");
        self.streams
            .insert(id, FileStream::new(key, mode, content, dirty));
        Ok(FileHandle(id))
    }

    fn stream(&mut self, handle: FileHandle) -> Result<&mut FileStream, Error> {
        self.streams.get_mut(&handle.0).ok_or_else(|| {
            Error::invalid_operation(format!("file handle {} is not open", handle.0))
        })
    }

    pub fn read(&mut self, handle: FileHandle, len: usize) -> Result<Vec<u8>, Error> {
        self.stream(handle)?.read(len)
    }

    /// Read everything from the cursor to the end of the file.
    pub fn read_to_end(&mut self, handle: FileHandle) -> Result<Vec<u8>, Error> {
        self.stream(handle)?.read(usize::MAX)
    }

    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> Result<usize, Error> {
        self.stream(handle)?.write(data)
    }

    pub fn seek(&mut self, handle: FileHandle, to: SeekFrom) -> Result<u64, Error> {
        self.stream(handle)?.seek(to)
    }

    pub fn tell(&mut self, handle: FileHandle) -> Result<u64, Error> {
        Ok(self.stream(handle)?.tell())
    }

    pub fn eof(&mut self, handle: FileHandle) -> Result<bool, Error> {
        Ok(self.stream(handle)?.eof())
    }

    /// Write the buffer of a writable file to the cache and update its entry.
    /// Flushing a read-only file does nothing.
    pub fn flush(&mut self, handle: FileHandle) -> Result<(), Error> {
        let stream = self.stream(handle)?;
        if !stream.mode().writable() {
            return Ok(());
        }

        let path = stream.path().to_string();
        let content = Bytes::copy_from_slice(stream.contents());
        self.write_back(&path, content)?;
        self.stream(handle)?.mark_clean();
        Ok(())
    }

    /// Flush if there are unflushed changes, then forget the handle. The
    /// handle is released even when the flush fails.
    pub fn close_file(&mut self, handle: FileHandle) -> Result<(), Error> {
        let stream = self.streams.remove(&handle.0).ok_or_else(|| {
            Error::invalid_operation(format!("file handle {} is not open", handle.0))
        })?;
        tracing::debug!(path = %stream.path(), handle = handle.0, "closing file");

        if stream.mode().writable() && stream.is_dirty() {
            self.write_back(stream.path(), Bytes::copy_from_slice(stream.contents()))?;
        }
        Ok(())
    }

    /// Number of files currently open in this session.
    pub fn open_file_count(&self) -> usize {
        self.streams.len()
    }

    fn write_back(&mut self, key: &str, content: Bytes) -> Result<(), Error> {
        let parent = self.paths.parent(key);
        if !self.is_directory(&parent) {
            return Err(Error::invalid_parent(key));
        }
        if self.index.is_dir(key) {
            return Err(Error::invalid_operation(format!("{} is a directory", key)));
        }

        let size = content.len() as u64;
        self.store.set(key, content, self.config.file_ttl())?;

        let now = unix_now();
        let ctime = self
            .index
            .get(key)
            .and_then(|entry| entry.ctime)
            .unwrap_or(now);
        self.index.insert(
            key.to_string(),
            Entry {
                kind: EntryKind::File,
                ctime: Some(ctime),
                mtime: Some(now),
                atime: Some(now),
                size: Some(size),
            },
        );
        tracing::debug!(path = key, size, "flushed file");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Directories
    // ---------------------------------------------------------------------

    /// Immediate child names of `path`, sorted. Unknown paths list nothing.
    pub fn list_children(&self, path: &str) -> Vec<String> {
        let key = self.paths.normalize(path);
        list_children(&self.index, &self.paths.child_prefix(&key))
    }

    /// Snapshot the children of `path` into a cursor. Always succeeds, even
    /// for paths that do not exist.
    pub fn opendir(&mut self, path: &str) -> DirHandle {
        let key = self.paths.normalize(path);
        let names = list_children(&self.index, &self.paths.child_prefix(&key));
        let id = self.allocate_handle();
        tracing::debug!(path = %key, handle = id, children = names.len(), "opened directory");
        self.dirs.insert(id, DirCursor::new(key, names));
        DirHandle(id)
    }

    fn cursor(&mut self, handle: DirHandle) -> Result<&mut DirCursor, Error> {
        self.dirs.get_mut(&handle.0).ok_or_else(|| {
            Error::invalid_operation(format!("directory handle {} is not open", handle.0))
        })
    }

    /// Next child name, or `None` when the listing is exhausted.
    pub fn readdir(&mut self, handle: DirHandle) -> Result<Option<String>, Error> {
        Ok(self.cursor(handle)?.next().map(str::to_string))
    }

    pub fn rewinddir(&mut self, handle: DirHandle) -> Result<(), Error> {
        self.cursor(handle)?.rewind();
        Ok(())
    }

    pub fn closedir(&mut self, handle: DirHandle) -> Result<(), Error> {
        self.dirs.remove(&handle.0).map(|_| ()).ok_or_else(|| {
            Error::invalid_operation(format!("directory handle {} is not open", handle.0))
        })
    }
}

impl<S: CacheStore> Drop for Session<S> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            tracing::warn!(error = %err, "session ended with errors");
        }
    }
}
