//! Open-file state: a mode plus an in-memory byte buffer with a cursor.
//!
//! Nothing here touches the cache. The session loads content into a
//! [`FileStream`] when it is opened and writes the buffer back on flush.

use std::fmt;
use std::io::SeekFrom;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Largest buffer a stream will grow to, in bytes.
pub const MAX_FILE_SIZE: usize = 1 << 30;

/// What happens to the target when a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenKind {
    /// `r`: the file must exist; start at byte 0.
    Read,
    /// `w`: start empty, replacing any content on flush.
    Write,
    /// `a`: keep existing content; every write goes to the end.
    Append,
    /// `x`: the path must not exist yet.
    Exclusive,
    /// `c`: keep existing content if any; start at byte 0.
    Create,
}

/// An fopen-style mode such as `"r"`, `"w+"` or `"ab"`.
///
/// `b` and `t` flags are accepted and ignored; `+` adds the missing half of
/// read/write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub kind: OpenKind,
    pub plus: bool,
}

impl OpenMode {
    pub const READ: OpenMode = OpenMode {
        kind: OpenKind::Read,
        plus: false,
    };
    pub const WRITE: OpenMode = OpenMode {
        kind: OpenKind::Write,
        plus: false,
    };
    pub const APPEND: OpenMode = OpenMode {
        kind: OpenKind::Append,
        plus: false,
    };

    pub fn readable(&self) -> bool {
        self.kind == OpenKind::Read || self.plus
    }

    pub fn writable(&self) -> bool {
        self.kind != OpenKind::Read || self.plus
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || Error::invalid_operation(format!("unsupported open mode '{}'", s));

        let mut flags = s.chars().filter(|c| !matches!(c, 'b' | 't'));
        let kind = match flags.next() {
            Some('r') => OpenKind::Read,
            Some('w') => OpenKind::Write,
            Some('a') => OpenKind::Append,
            Some('x') => OpenKind::Exclusive,
            Some('c') => OpenKind::Create,
            _ => return Err(unsupported()),
        };
        let plus = match (flags.next(), flags.next()) {
            (None, _) => false,
            (Some('+'), None) => true,
            _ => return Err(unsupported()),
        };

        Ok(OpenMode { kind, plus })
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self.kind {
            OpenKind::Read => 'r',
            OpenKind::Write => 'w',
            OpenKind::Append => 'a',
            OpenKind::Exclusive => 'x',
            OpenKind::Create => 'c',
        };
        if self.plus {
            write!(f, "{}+", c)
        } else {
            write!(f, "{}", c)
        }
    }
}

/// One open file.
#[derive(Debug)]
pub(crate) struct FileStream {
    path: String,
    mode: OpenMode,
    buffer: Vec<u8>,
    position: usize,
    /// Written to since the last flush.
    dirty: bool,
}

impl FileStream {
    /// `content` is the file's current bytes (empty for truncating modes).
    /// `dirty` marks a buffer that must reach the store on close even if it
    /// is never written to, such as a truncated or newly created file.
    pub(crate) fn new(path: String, mode: OpenMode, content: Vec<u8>, dirty: bool) -> Self {
        let position = if mode.kind == OpenKind::Append {
            content.len()
        } else {
            0
        };
        Self {
            path,
            mode,
            buffer: content,
            position,
            dirty,
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn mode(&self) -> OpenMode {
        self.mode
    }

    pub(crate) fn contents(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Read up to `len` bytes from the cursor.
    pub(crate) fn read(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        if !self.mode.readable() {
            return Err(Error::invalid_operation(format!(
                "{} is not open for reading (mode '{}')",
                self.path, self.mode
            )));
        }

        let available = self.buffer.get(self.position..).unwrap_or(&[]);
        let chunk = available[..len.min(available.len())].to_vec();
        self.position += chunk.len();
        Ok(chunk)
    }

    /// Write `data` at the cursor (or at the end in append mode), growing the
    /// buffer and zero-filling any gap left by an earlier seek.
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        if !self.mode.writable() {
            return Err(Error::invalid_operation(format!(
                "{} is not open for writing (mode '{}')",
                self.path, self.mode
            )));
        }

        if self.mode.kind == OpenKind::Append {
            self.position = self.buffer.len();
        }

        let end = self
            .position
            .checked_add(data.len())
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or_else(|| {
                Error::invalid_operation(format!(
                    "writing {} bytes at offset {} of {} exceeds the {} byte file limit",
                    data.len(),
                    self.position,
                    self.path,
                    MAX_FILE_SIZE
                ))
            })?;
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(data);
        self.position = end;
        self.dirty = true;
        Ok(data.len())
    }

    /// Move the cursor. Positions past the end are allowed; positions
    /// before byte 0 are not.
    pub(crate) fn seek(&mut self, to: SeekFrom) -> Result<u64, Error> {
        let target = match to {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => self.position as i128 + i128::from(delta),
            SeekFrom::End(delta) => self.buffer.len() as i128 + i128::from(delta),
        };

        let position = usize::try_from(target).map_err(|_| {
            Error::invalid_operation(format!("cannot seek {} to offset {}", self.path, target))
        })?;
        self.position = position;
        Ok(position as u64)
    }

    pub(crate) fn tell(&self) -> u64 {
        self.position as u64
    }

    pub(crate) fn eof(&self) -> bool {
        self.position >= self.buffer.len()
    }
}
