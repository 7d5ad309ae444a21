//! Prefix index over import paths
//!
//! A trie keyed by path components, built once from the `require` entries of
//! go.mod. It answers "is this import path a declared requirement, or a
//! package underneath one?" in time proportional to the length of the path,
//! independent of how many requirements are declared.
//!
//! Components keep their leading separator, so `a/bc` is stored as `a`, `/bc`
//! and can never collide with `a/b` + `c`.

use std::collections::HashMap;
use std::fmt;

const SEPARATOR: u8 = b'/';

/// Trie of import path components
#[derive(Debug, Clone)]
pub struct PathTrie {
    /// `None` marks a leaf: everything below it is covered by the entry.
    children: Option<HashMap<String, PathTrie>>,
}

impl PathTrie {
    /// Create an empty index
    ///
    /// The root always owns an (empty) children map, so an index without any
    /// entries matches nothing.
    pub fn new() -> Self {
        Self {
            children: Some(HashMap::new()),
        }
    }

    fn leaf() -> Self {
        Self { children: None }
    }

    /// Insert an import path
    pub fn put(&mut self, import_path: &str) {
        let mut node = self;
        for segment in Segments::new(import_path) {
            node = node
                .children
                .get_or_insert_with(HashMap::new)
                .entry(segment.to_string())
                .or_insert_with(PathTrie::leaf);
        }
    }

    /// Check whether `import_path` is covered by the index
    ///
    /// For an index holding `a/b/c`:
    /// - `a/b` is covered, it leads to an entry without diverging
    /// - `a/b/c/d` is covered, it continues below a leaf
    /// - `a/b/f` is not, `b` has children and none of them is `/f`
    pub fn has_prefix(&self, import_path: &str) -> bool {
        let mut node = self;
        for segment in Segments::new(import_path) {
            let Some(children) = &node.children else {
                return true;
            };
            match children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    /// Total number of nodes, root included
    pub fn count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flat_map(|children| children.values())
            .map(PathTrie::count)
            .sum::<usize>()
    }

    /// Whether nothing was inserted
    pub fn is_empty(&self) -> bool {
        self.children.as_ref().map_or(true, HashMap::is_empty)
    }

    fn draw(&self, out: &mut String, prefix: &str, is_last: bool, label: &str) {
        out.push_str(prefix);
        out.push_str(if is_last { "└── " } else { "├── " });
        out.push_str(label);
        out.push('\n');

        let Some(children) = &self.children else {
            return;
        };

        let mut keys: Vec<&String> = children.keys().collect();
        keys.sort();

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        for (i, key) in keys.iter().enumerate() {
            children[*key].draw(out, &child_prefix, i == keys.len() - 1, key);
        }
    }
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PathTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.draw(&mut out, "", true, "(root)");
        f.write_str(&out)
    }
}

/// Splits a path into components without allocating:
/// `"a/b/c"` yields `"a"`, `"/b"`, `"/c"`.
struct Segments<'a> {
    path: &'a str,
    start: usize,
}

impl<'a> Segments<'a> {
    fn new(path: &'a str) -> Self {
        Self { path, start: 0 }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.path.len() {
            return None;
        }

        let rest = &self.path[self.start..];
        // The separator is ASCII, so the split offset is always a char boundary
        let end = rest.as_bytes()[1..]
            .iter()
            .position(|&b| b == SEPARATOR)
            .map_or(rest.len(), |pos| pos + 1);

        self.start += end;
        Some(&rest[..end])
    }
}
