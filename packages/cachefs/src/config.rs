//! Session configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::Error;

pub const DEFAULT_SCHEME: &str = "cache";
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 60;
pub const DEFAULT_INDEX_KEY: &str = "__cachefs_index__";
pub const DEFAULT_LOCK_KEY: &str = "__cachefs_lock__";

/// Everything a [`Session`](crate::Session) needs to know besides its store.
///
/// Deserializes from JSON with every field optional:
///
/// ```rust
/// use cachefs::SessionConfig;
///
/// let config: SessionConfig = serde_json::from_str(r#"{"scheme": "mem"}"#).unwrap();
/// assert_eq!(config.scheme, "mem");
/// assert_eq!(config.time_limit().as_secs(), 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// URL scheme that prefixes every path, without the `://`.
    pub scheme: String,
    /// Longest a session may hold the index lock. Also the lock record's
    /// expiry, and the age after which a lock left behind is ignored.
    pub time_limit_secs: u64,
    /// First pause while waiting for a held lock.
    pub lock_retry_initial_ms: u64,
    /// Upper bound the doubling pause is clamped to.
    pub lock_retry_max_ms: u64,
    /// Retention of file content written to the store; `None` never expires.
    pub file_ttl_secs: Option<u64>,
    pub index_key: String,
    pub lock_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            lock_retry_initial_ms: 10,
            lock_retry_max_ms: 500,
            file_ttl_secs: None,
            index_key: DEFAULT_INDEX_KEY.to_string(),
            lock_key: DEFAULT_LOCK_KEY.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, secs: u64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    #[must_use]
    pub fn with_lock_retry(mut self, initial: Duration, max: Duration) -> Self {
        self.lock_retry_initial_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        self.lock_retry_max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_file_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.file_ttl_secs = ttl.map(|ttl| ttl.as_secs());
        self
    }

    #[must_use]
    pub fn with_keys(mut self, index_key: impl Into<String>, lock_key: impl Into<String>) -> Self {
        self.index_key = index_key.into();
        self.lock_key = lock_key.into();
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn lock_retry_initial(&self) -> Duration {
        Duration::from_millis(self.lock_retry_initial_ms)
    }

    pub fn lock_retry_max(&self) -> Duration {
        Duration::from_millis(self.lock_retry_max_ms)
    }

    pub fn file_ttl(&self) -> Option<Duration> {
        self.file_ttl_secs.map(Duration::from_secs)
    }

    /// Check the scheme and the retry bounds.
    ///
    /// A scheme starts with an ASCII letter followed by letters, digits,
    /// `+`, `-` or `.`.
    pub fn validate(&self) -> Result<(), Error> {
        let mut chars = self.scheme.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        if !valid_start
            || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(Error::invalid_operation(format!(
                "invalid scheme '{}'",
                self.scheme
            )));
        }

        if self.lock_retry_initial_ms == 0 || self.lock_retry_initial_ms > self.lock_retry_max_ms
        {
            return Err(Error::invalid_operation(format!(
                "lock retry bounds must satisfy 0 < initial ({}ms) <= max ({}ms)",
                self.lock_retry_initial_ms, self.lock_retry_max_ms
            )));
        }

        if self.index_key == self.lock_key {
            return Err(Error::invalid_operation(
                "index key and lock key must differ",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_limit(), Duration::from_secs(60));
        assert_eq!(config.file_ttl(), None);
    }

    #[test]
    fn rejects_bad_schemes() {
        for scheme in ["", "1abc", "ca che", "cache:", "c/d"] {
            let config = SessionConfig::new().with_scheme(scheme);
            assert!(config.validate().is_err(), "accepted {:?}", scheme);
        }
        assert!(SessionConfig::new()
            .with_scheme("my-cache+v1.2")
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_inverted_retry_bounds() {
        let config = SessionConfig::new()
            .with_lock_retry(Duration::from_millis(100), Duration::from_millis(10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_retry_durations_saturate() {
        let config = SessionConfig::new().with_lock_retry(Duration::from_millis(5), Duration::MAX);
        assert_eq!(config.lock_retry_max_ms, u64::MAX);
        assert_eq!(config.lock_retry_initial(), Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_colliding_keys() {
        let config = SessionConfig::new().with_keys("same", "same");
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"time_limit_secs": 5, "file_ttl_secs": 30}"#).unwrap();
        assert_eq!(config.scheme, DEFAULT_SCHEME);
        assert_eq!(config.time_limit(), Duration::from_secs(5));
        assert_eq!(config.file_ttl(), Some(Duration::from_secs(30)));
    }
}
