//! Path normalization.
//!
//! Every caller-supplied path goes through [`PathNormalizer::normalize`]
//! before it touches the index, so two spellings of the same object always
//! land on the same key.

use std::fmt;

/// Turns raw paths into canonical index keys of the form `scheme://a/b/c`.
///
/// The bare root is `scheme://`; no other key ends with a separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathNormalizer {
    prefix: String,
}

impl PathNormalizer {
    /// `scheme` is given without the `://`.
    pub fn new(scheme: &str) -> Self {
        Self {
            prefix: format!("{}://", scheme),
        }
    }

    /// The root key, `scheme://`.
    pub fn root(&self) -> &str {
        &self.prefix
    }

    pub fn is_root(&self, key: &str) -> bool {
        key == self.prefix
    }

    /// Canonicalize `raw`.
    ///
    /// Backslashes become `/`, the scheme prefix is dropped, empty and `.`
    /// segments vanish, and each `..` removes itself together with the
    /// segment before it. Resolution is relative: a `..` with nothing before
    /// it simply disappears instead of escaping the root.
    ///
    /// ```rust
    /// use cachefs::PathNormalizer;
    ///
    /// let paths = PathNormalizer::new("cache");
    /// assert_eq!(paths.normalize("/a//b/../c/"), "cache://a/c");
    /// assert_eq!(paths.normalize("cache://a\\b"), "cache://a/b");
    /// assert_eq!(paths.normalize("../.."), "cache://");
    /// ```
    pub fn normalize(&self, raw: &str) -> String {
        let unified = raw.replace('\\', "/");
        let rest = unified.strip_prefix(&self.prefix).unwrap_or(&unified);

        let mut segments: Vec<&str> = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                name => segments.push(name),
            }
        }

        let mut key = String::with_capacity(self.prefix.len() + rest.len());
        key.push_str(&self.prefix);
        key.push_str(&segments.join("/"));
        key
    }

    /// Key of the directory containing `key`. The root is its own parent.
    pub fn parent(&self, key: &str) -> String {
        let Some(rest) = key.strip_prefix(&self.prefix) else {
            return self.prefix.clone();
        };
        match rest.rfind('/') {
            Some(idx) => format!("{}{}", self.prefix, &rest[..idx]),
            None => self.prefix.clone(),
        }
    }

    /// Last segment of `key`, or `None` for the root.
    pub fn file_name<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(&self.prefix)?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.rsplit('/').next().unwrap_or(rest))
    }

    /// The prefix every descendant key of `key` starts with.
    pub fn child_prefix(&self, key: &str) -> String {
        if self.is_root(key) {
            self.prefix.clone()
        } else {
            format!("{}/", key)
        }
    }
}

impl fmt::Display for PathNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}
