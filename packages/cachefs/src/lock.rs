//! Advisory cross-session lock over the index.
//!
//! The lock is a single cache record holding the holder's start time in
//! Unix seconds, stored with an expiry equal to the session time limit.
//! There is no compare-and-swap: two sessions that both see the record
//! missing (or abandoned) at the same moment will both proceed, and the one
//! that persists last wins.

use std::time::Duration;

use bytes::Bytes;

use cachefs_kv_store::CacheStore;

use crate::index::unix_now;
use crate::{Error, SessionConfig};

/// Proof that this session wrote the lock record.
#[derive(Debug)]
pub(crate) struct IndexLock {
    key: String,
    acquired_at: i64,
    held: bool,
}

fn parse_stamp(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

impl IndexLock {
    /// Wait until the lock record is gone or abandoned, then claim it.
    ///
    /// A record is abandoned once its stamp plus the time limit has passed,
    /// so the wait never outlasts one time limit. While waiting, the pause
    /// between polls doubles from `lock_retry_initial` up to
    /// `lock_retry_max`.
    pub(crate) fn acquire<S: CacheStore + ?Sized>(
        store: &mut S,
        config: &SessionConfig,
    ) -> Result<Self, Error> {
        let limit = i64::try_from(config.time_limit_secs).unwrap_or(i64::MAX);
        let max_pause = config.lock_retry_max();
        let mut pause = config.lock_retry_initial();
        let mut polls: u32 = 0;

        while let Some(raw) = store.get(&config.lock_key)? {
            let Some(stamp) = parse_stamp(&raw) else {
                tracing::warn!(key = %config.lock_key, "unreadable lock record, taking over");
                break;
            };

            let age = unix_now().saturating_sub(stamp);
            if age >= limit {
                tracing::warn!(
                    key = %config.lock_key,
                    age_secs = age,
                    "lock outlived the session time limit, treating it as abandoned"
                );
                break;
            }

            polls += 1;
            let pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX);
            tracing::trace!(key = %config.lock_key, polls, pause_ms, "lock held, waiting");
            std::thread::sleep(pause);
            pause = next_pause(pause, max_pause);
        }

        let acquired_at = unix_now();
        store.set(
            &config.lock_key,
            Bytes::from(acquired_at.to_string()),
            Some(config.time_limit()),
        )?;
        tracing::debug!(key = %config.lock_key, polls, "index lock acquired");

        Ok(Self {
            key: config.lock_key.clone(),
            acquired_at,
            held: true,
        })
    }

    /// Delete the lock record. Releasing twice is a no-op.
    pub(crate) fn release<S: CacheStore + ?Sized>(&mut self, store: &mut S) -> Result<(), Error> {
        if !self.held {
            return Ok(());
        }
        store.delete(&self.key)?;
        self.held = false;
        tracing::debug!(
            key = %self.key,
            held_secs = unix_now().saturating_sub(self.acquired_at),
            "index lock released"
        );
        Ok(())
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held
    }
}

fn next_pause(pause: Duration, max: Duration) -> Duration {
    pause.saturating_mul(2).min(max)
}
