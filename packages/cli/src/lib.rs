//! # cachefs-cli
//!
//! Command-line access to a cachefs kept in a cache directory on disk.
//!
//! Every invocation opens one session: it waits for the index lock, runs
//! the command, then persists the index and releases the lock. Processes
//! pointed at the same `--cache-dir` therefore take turns.
//!
//! ## Usage
//!
//! ```bash
//! cachefs mkdir /notes
//! echo "hello" | cachefs put /notes/today.txt
//! cachefs ls -l /notes
//! cachefs cat /notes/today.txt
//!
//! # Drive the engine with JSON calls, one per line
//! echo '{"op": "stat", "path": "/notes"}' | cachefs exec
//! ```

pub mod commands;
pub mod error;

pub use error::CliError;
