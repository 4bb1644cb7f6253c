//! Content-addressed directory descriptions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};

use blobcask_hash::ContentHash;

/// Description of a filesystem subtree.
///
/// A node is either the content hash of a file's bytes or a mapping
/// from entry name to subtree. Directory keys live in a `BTreeMap`, so
/// serialization is always lexicographically sorted: identical
/// directory contents produce identical descriptions regardless of
/// listing order.
///
/// The JSON form is untagged: `"<hash>"` for a file, an object for a
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirTree {
    File(ContentHash),
    Dir(BTreeMap<String, DirTree>),
}

impl DirTree {
    /// Create an empty directory node
    pub fn empty_dir() -> Self {
        DirTree::Dir(BTreeMap::new())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, DirTree::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, DirTree::Dir(_))
    }

    /// Look up a direct child by name
    pub fn child(&self, name: &str) -> Option<&DirTree> {
        match self {
            DirTree::File(_) => None,
            DirTree::Dir(entries) => entries.get(name),
        }
    }

    /// Serialize to canonical JSON (keys sorted by construction).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a description from its JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl From<ContentHash> for DirTree {
    fn from(hash: ContentHash) -> Self {
        DirTree::File(hash)
    }
}

/// True if `name` resolves to exactly one normal path segment: no
/// separators, no `.`/`..`, not absolute, non-empty. Joining such a
/// name onto a directory cannot escape it.
pub(crate) fn is_normal_component(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Rewrite an unsafe entry name into a single normal segment: runs of
/// alphanumerics, `-`, `_` and `.` are kept, every other run collapses
/// to a single `.`, and leading/trailing dots are trimmed. Names that
/// still do not form a normal segment become `_`.
pub(crate) fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            if gap && !out.is_empty() {
                out.push('.');
            }
            gap = false;
            out.push(ch);
        } else {
            gap = true;
        }
    }
    let trimmed = out.trim_matches('.');
    if is_normal_component(trimmed) {
        trimmed.to_string()
    } else {
        "_".to_string()
    }
}
