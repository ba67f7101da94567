//! The host callback contract as data.
//!
//! A host that routes filesystem hooks (open, read, mkdir, ...) to this
//! engine sends one [`Call`] per hook and gets back one [`Reply`]. Failures
//! never escape as errors: they come back as [`Reply::Failed`] with a
//! diagnostic, and the session carries on.
//!
//! Both types are serde-tagged, so a call reads as
//! `{"op": "open", "path": "/d/f.txt", "mode": "w"}` and byte payloads
//! travel as base64 strings.

use std::io::SeekFrom;

use serde::{Deserialize, Serialize};

use cachefs_kv_store::CacheStore;

use crate::{DirHandle, Error, ErrorKind, FileHandle, Session, Stat};

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Reference point for [`Call::Seek`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Whence {
    #[default]
    Set,
    Cur,
    End,
}

/// One filesystem hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    Open {
        path: String,
        mode: String,
    },
    Read {
        handle: FileHandle,
        len: usize,
    },
    Write {
        handle: FileHandle,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Seek {
        handle: FileHandle,
        offset: i64,
        #[serde(default)]
        whence: Whence,
    },
    Tell {
        handle: FileHandle,
    },
    Eof {
        handle: FileHandle,
    },
    Flush {
        handle: FileHandle,
    },
    Close {
        handle: FileHandle,
    },
    Stat {
        path: String,
    },
    Unlink {
        path: String,
    },
    Mkdir {
        path: String,
    },
    Rmdir {
        path: String,
    },
    Opendir {
        path: String,
    },
    Readdir {
        handle: DirHandle,
    },
    Rewinddir {
        handle: DirHandle,
    },
    Closedir {
        handle: DirHandle,
    },
    Rename {
        from: String,
        to: String,
    },
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Call::Open { .. } => "open",
            Call::Read { .. } => "read",
            Call::Write { .. } => "write",
            Call::Seek { .. } => "seek",
            Call::Tell { .. } => "tell",
            Call::Eof { .. } => "eof",
            Call::Flush { .. } => "flush",
            Call::Close { .. } => "close",
            Call::Stat { .. } => "stat",
            Call::Unlink { .. } => "unlink",
            Call::Mkdir { .. } => "mkdir",
            Call::Rmdir { .. } => "rmdir",
            Call::Opendir { .. } => "opendir",
            Call::Readdir { .. } => "readdir",
            Call::Rewinddir { .. } => "rewinddir",
            Call::Closedir { .. } => "closedir",
            Call::Rename { .. } => "rename",
        }
    }
}

/// Outcome of one [`Call`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    /// Success with nothing to return.
    Ok,
    File {
        handle: FileHandle,
    },
    Dir {
        handle: DirHandle,
    },
    Data {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Written {
        bytes: usize,
    },
    Position {
        position: u64,
    },
    Eof {
        eof: bool,
    },
    Stat {
        stat: Stat,
    },
    /// A `readdir` result; `None` once the listing is exhausted.
    Entry {
        name: Option<String>,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Failed { .. })
    }
}

impl<S: CacheStore> Session<S> {
    /// Run one hook call against this session.
    pub fn dispatch(&mut self, call: Call) -> Reply {
        let op = call.op();
        match self.run_call(call) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(op, error = %err, "filesystem call failed");
                Reply::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    fn run_call(&mut self, call: Call) -> Result<Reply, Error> {
        let reply = match call {
            Call::Open { path, mode } => Reply::File {
                handle: self.open_file(&path, mode.parse()?)?,
            },
            Call::Read { handle, len } => Reply::Data {
                data: self.read(handle, len)?,
            },
            Call::Write { handle, data } => Reply::Written {
                bytes: self.write(handle, &data)?,
            },
            Call::Seek {
                handle,
                offset,
                whence,
            } => {
                let to = match whence {
                    Whence::Set => SeekFrom::Start(u64::try_from(offset).map_err(|_| {
                        Error::invalid_operation(format!("cannot seek to offset {}", offset))
                    })?),
                    Whence::Cur => SeekFrom::Current(offset),
                    Whence::End => SeekFrom::End(offset),
                };
                Reply::Position {
                    position: self.seek(handle, to)?,
                }
            }
            Call::Tell { handle } => Reply::Position {
                position: self.tell(handle)?,
            },
            Call::Eof { handle } => Reply::Eof {
                eof: self.eof(handle)?,
            },
            Call::Flush { handle } => {
                self.flush(handle)?;
                Reply::Ok
            }
            Call::Close { handle } => {
                self.close_file(handle)?;
                Reply::Ok
            }
            Call::Stat { path } => Reply::Stat {
                stat: self.stat(&path)?,
            },
            Call::Unlink { path } => {
                self.unlink(&path)?;
                Reply::Ok
            }
            Call::Mkdir { path } => {
                self.mkdir(&path)?;
                Reply::Ok
            }
            Call::Rmdir { path } => {
                self.rmdir(&path)?;
                Reply::Ok
            }
            Call::Opendir { path } => Reply::Dir {
                handle: self.opendir(&path),
            },
            Call::Readdir { handle } => Reply::Entry {
                name: self.readdir(handle)?,
            },
            Call::Rewinddir { handle } => {
                self.rewinddir(handle)?;
                Reply::Ok
            }
            Call::Closedir { handle } => {
                self.closedir(handle)?;
                Reply::Ok
            }
            Call::Rename { from, to } => {
                self.rename(&from, &to)?;
                Reply::Ok
            }
        };
        Ok(reply)
    }
}
