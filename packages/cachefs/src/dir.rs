//! Directory listings derived from the flat index.
//!
//! There is no tree anywhere: the children of a directory are whatever
//! index keys sit under its prefix, collapsed to their first segment.

use std::collections::BTreeSet;

use crate::index::Index;

/// Immediate child names of the directory `key`, sorted.
///
/// `child_prefix` is `key` followed by the separator (or the bare root
/// prefix). Deeper descendants contribute the name of the child they live
/// under, so an orphaned `a/b/c` still lists `b` under `a`.
pub(crate) fn list_children(index: &Index, child_prefix: &str) -> Vec<String> {
    let names: BTreeSet<&str> = index
        .paths()
        .filter_map(|path| path.strip_prefix(child_prefix))
        .filter_map(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .collect();

    names.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    NotStarted,
    At(usize),
    Exhausted,
}

/// Position within one directory listing, for `readdir`-style iteration.
///
/// The listing is captured when the cursor is created; later index changes
/// are not reflected until the directory is opened again.
#[derive(Debug, Clone)]
pub struct DirCursor {
    path: String,
    names: Vec<String>,
    state: CursorState,
}

impl DirCursor {
    pub(crate) fn new(path: String, names: Vec<String>) -> Self {
        Self {
            path,
            names,
            state: CursorState::NotStarted,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Advance and return the next child name, or `None` once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&str> {
        let idx = match self.state {
            CursorState::NotStarted => 0,
            CursorState::At(i) => i + 1,
            CursorState::Exhausted => return None,
        };

        if idx < self.names.len() {
            self.state = CursorState::At(idx);
            Some(&self.names[idx])
        } else {
            self.state = CursorState::Exhausted;
            None
        }
    }

    /// Return to before the first entry.
    pub fn rewind(&mut self) {
        self.state = CursorState::NotStarted;
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Entry;

    fn index_with(paths: &[&str]) -> Index {
        let mut index = Index::new();
        for path in paths {
            index.insert(path.to_string(), Entry::directory(0));
        }
        index
    }

    #[test]
    fn children_collapse_and_dedupe() {
        let index = index_with(&[
            "cache://d",
            "cache://d/b",
            "cache://d/a.txt",
            "cache://d/b/deep",
            "cache://d/c/orphan/x",
            "cache://dx/not_a_child",
        ]);

        assert_eq!(
            list_children(&index, "cache://d/"),
            vec!["a.txt".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn root_lists_top_level() {
        let index = index_with(&["cache://a", "cache://a/b", "cache://z"]);
        assert_eq!(list_children(&index, "cache://"), vec!["a", "z"]);
    }

    #[test]
    fn unknown_directory_is_empty() {
        let index = index_with(&["cache://a"]);
        assert!(list_children(&index, "cache://nope/").is_empty());
    }

    #[test]
    fn cursor_walks_then_exhausts() {
        let mut cursor = DirCursor::new("cache://d".into(), vec!["a".into(), "b".into()]);

        assert_eq!(cursor.next(), Some("a"));
        assert_eq!(cursor.next(), Some("b"));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn rewind_restarts_at_first() {
        let mut cursor = DirCursor::new("cache://d".into(), vec!["a".into(), "b".into()]);
        cursor.next();
        cursor.next();
        cursor.next();

        cursor.rewind();
        assert_eq!(cursor.next(), Some("a"));
    }

    #[test]
    fn empty_cursor() {
        let mut cursor = DirCursor::new("cache://e".into(), Vec::new());
        assert_eq!(cursor.next(), None);
        cursor.rewind();
        assert_eq!(cursor.next(), None);
        assert!(cursor.names().is_empty());
    }
}
