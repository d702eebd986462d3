use std::fmt;

use chrono::{DateTime, Utc};

pub mod tree_path;

pub use tree_path::TreePath;

/// Archive identity. At the boundary this is the absolute path of the
/// archive root; inside the model it is treated as an opaque key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Root(String);

impl Root {
    pub fn new(root: impl Into<String>) -> Self {
        Self(root.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Root {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Location of an entry inside one archive: directory path plus basename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    pub path: TreePath,
    pub base: String,
}

impl Name {
    pub fn new(path: impl Into<TreePath>, base: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
        }
    }

    /// Slash-joined path relative to the archive root.
    pub fn full_name(&self) -> String {
        if self.path.is_root() {
            self.base.clone()
        } else {
            format!("{}/{}", self.path, self.base)
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Globally unique identifier of a filesystem entry in the current run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    pub root: Root,
    pub name: Name,
}

impl FileId {
    pub fn new(root: Root, name: Name) -> Self {
        Self { root, name }
    }

    pub fn path(&self) -> &TreePath {
        &self.name.path
    }

    pub fn base(&self) -> &str {
        &self.name.base
    }

    /// Absolute slash-joined path, suitable for handing to the platform.
    pub fn abs_string(&self) -> String {
        format!("{}/{}", self.root, self.name.full_name())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.root, self.name)
    }
}

/// Opaque content address. Equality implies content equality by assumption
/// of the scanner. The empty string means "not yet computed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(String);

impl Hash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Hash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Scanner-reported record for one file. The hash starts empty and is
/// filled in exactly once by a hashing event; mutation operations may
/// rewrite the identity afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub id: FileId,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub hash: Hash,
}

impl FileMeta {
    pub fn new(id: FileId, size: u64, mod_time: DateTime<Utc>) -> Self {
        Self {
            id,
            size,
            mod_time,
            hash: Hash::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Folder,
}

/// Per-file classification derived from the cross-archive hash index.
/// Variant order matters: folding a folder row takes the maximum state of
/// the files it contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileState {
    #[default]
    Initial,
    Resolved,
    Pending,
    Duplicate,
    Absent,
}

impl FileState {
    pub fn raise_to(&mut self, other: FileState) {
        if *self < other {
            *self = other;
        }
    }

    /// Column text shown in the listing. Resolved files show nothing.
    pub fn label(self) -> &'static str {
        match self {
            FileState::Initial | FileState::Resolved => "",
            FileState::Pending => "Pending",
            FileState::Duplicate => "Duplicate",
            FileState::Absent => "Absent",
        }
    }
}

/// The four sortable columns of the folder listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Name,
    State,
    Time,
    Size,
}

impl SortColumn {
    pub const ALL: [SortColumn; 4] = [
        SortColumn::Name,
        SortColumn::State,
        SortColumn::Time,
        SortColumn::Size,
    ];

    pub fn index(self) -> usize {
        match self {
            SortColumn::Name => 0,
            SortColumn::State => 1,
            SortColumn::Time => 2,
            SortColumn::Size => 3,
        }
    }
}

/// Where an archive is in its lifecycle: metadata scan, content hashing,
/// fully hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Scanning,
    Hashing,
    Hashed,
}
