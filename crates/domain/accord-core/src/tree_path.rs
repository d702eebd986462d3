use std::fmt;

/// Slash-delimited directory path relative to an archive root. The empty
/// path is the root directory itself. Prefix relationships are always
/// component-wise: "a" is an ancestor of "a/b" but not of "ab".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath(String);

impl TreePath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one basename, producing the path of a child directory.
    pub fn join(&self, base: &str) -> TreePath {
        if self.is_root() {
            TreePath(base.to_string())
        } else {
            TreePath(format!("{}/{}", self.0, base))
        }
    }

    /// Drop the last component. The root's parent is the root.
    pub fn parent(&self) -> TreePath {
        match self.0.rfind('/') {
            Some(idx) => TreePath(self.0[..idx].to_string()),
            None => TreePath::root(),
        }
    }

    /// Component-wise ancestry test, inclusive of equality.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        if prefix.is_root() {
            return true;
        }
        match self.0.strip_prefix(&prefix.0) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }

    /// Strict ancestry: `prefix` is above `self`, and not equal to it.
    pub fn is_strict_prefix_of(&self, other: &TreePath) -> bool {
        other != self && other.starts_with(self)
    }

    /// The part of `self` below `prefix`, when `prefix` is an ancestor.
    pub fn strip_prefix(&self, prefix: &TreePath) -> Option<&str> {
        if prefix.is_root() {
            return Some(&self.0);
        }
        match self.0.strip_prefix(&prefix.0) {
            Some("") => Some(""),
            Some(rest) => rest.strip_prefix('/'),
            None => None,
        }
    }

    pub fn first_component(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            Some(self.0.split('/').next().unwrap_or(&self.0))
        }
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TreePath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TreePath {
    fn from(s: String) -> Self {
        Self(s)
    }
}
