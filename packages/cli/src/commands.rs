//! Subcommand implementations.
//!
//! Each command runs inside an already-open session and writes its output
//! to the given writer, so the binary decides where stdout goes and tests
//! can capture it.

use std::io::{BufRead, Read, Write};

use cachefs::{CacheStore, Call, DiskCache, Error, ErrorKind, OpenMode, Reply, Session};

use crate::CliError;

/// List a directory, or name a single file.
pub fn ls<S: CacheStore>(
    session: &mut Session<S>,
    path: &str,
    long: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let key = session.normalize(path);
    let stat = session.stat(&key)?;
    if !stat.is_dir() {
        let name = session.paths().file_name(&key).unwrap_or(key.as_str());
        writeln!(out, "{}", name)?;
        return Ok(());
    }

    let prefix = session.paths().child_prefix(&key);
    for name in session.list_children(&key) {
        let child = format!("{}{}", prefix, name);
        if !long {
            let suffix = if session.index().is_dir(&child) { "/" } else { "" };
            writeln!(out, "{}{}", name, suffix)?;
            continue;
        }

        match session.stat(&child) {
            Ok(stat) => {
                let kind = if stat.is_dir() { 'd' } else { '-' };
                writeln!(
                    out,
                    "{} {:>10} {} {}",
                    kind,
                    stat.size,
                    format_time(stat.mtime),
                    name
                )?;
            }
            // Evicted content, or a child that only exists as a path prefix.
            Err(Error::NotFound { .. }) => {
                tracing::debug!(path = %child, "skipping unlisted child");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

pub fn cat<S: CacheStore>(
    session: &mut Session<S>,
    path: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let file = session.open_file(path, OpenMode::READ)?;
    let data = session.read_to_end(file);
    session.close_file(file)?;
    out.write_all(&data?)?;
    Ok(())
}

/// Store everything read from `input` at `path`.
pub fn put<S: CacheStore>(
    session: &mut Session<S>,
    path: &str,
    input: &mut impl Read,
    append: bool,
    parents: bool,
) -> Result<usize, CliError> {
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;

    if parents {
        let key = session.normalize(path);
        let parent = session.paths().parent(&key);
        session.mkdir(&parent)?;
    }

    let mode = if append {
        OpenMode::APPEND
    } else {
        OpenMode::WRITE
    };
    let file = session.open_file(path, mode)?;
    let written = session.write(file, &data);
    session.close_file(file)?;
    Ok(written?)
}

/// Remove a file. With `force`, a missing file is not an error.
pub fn rm<S: CacheStore>(session: &mut Session<S>, path: &str, force: bool) -> Result<(), CliError> {
    match session.unlink(path) {
        Err(Error::NotFound { .. }) if force => Ok(()),
        other => Ok(other?),
    }
}

pub fn stat<S: CacheStore>(
    session: &mut Session<S>,
    path: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let stat = session.stat(path)?;
    serde_json::to_writer_pretty(&mut *out, &stat)?;
    writeln!(out)?;
    Ok(())
}

/// Run one JSON [`Call`] per input line and write one JSON [`Reply`] per
/// line. Blank lines are skipped; a line that is not a valid call gets a
/// failed reply. Returns the number of calls answered.
pub fn exec<S: CacheStore>(
    session: &mut Session<S>,
    input: impl BufRead,
    out: &mut impl Write,
) -> Result<usize, CliError> {
    let mut answered = 0;
    for (number, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Call>(&line) {
            Ok(call) => session.dispatch(call),
            Err(err) => {
                tracing::warn!(line = number + 1, error = %err, "unparseable call");
                Reply::Failed {
                    kind: ErrorKind::InvalidOperation,
                    message: format!("line {}: {}", number + 1, err),
                }
            }
        };
        serde_json::to_writer(&mut *out, &reply)?;
        writeln!(out)?;
        answered += 1;
    }
    out.flush()?;
    Ok(answered)
}

/// Delete expired entries from a cache directory.
pub fn gc(store: &DiskCache, out: &mut impl Write) -> Result<usize, CliError> {
    let removed = store.purge_expired()?;
    writeln!(out, "removed {} expired entries", removed)?;
    Ok(removed)
}
