use accord_core::{FileId, FileMeta, Hash, Root, SortColumn, TreePath};

use crate::ops::FileOp;

/// Everything that can arrive on the event bus: scanner-origin events
/// followed by input events. Per-producer ordering is preserved by the
/// bus; cross-producer ordering is not.
#[derive(Debug, Clone)]
pub enum Event {
    // Scanner events
    ArchiveScanned { root: Root, metas: Vec<FileMeta> },
    FileHashed { id: FileId, hash: Hash },
    ArchiveHashed { root: Root },
    HashingProgress { root: Root, hashed: u64 },
    CopyingProgress { copied: u64 },
    FilesHandled { op: FileOp },
    /// Recoverable failure. When a mutation failed, `op` names it so the
    /// reconciler can drop it from the pending log and allow a reissue.
    Error {
        root: Option<Root>,
        op: Option<FileOp>,
        message: String,
    },

    // Input events
    ScreenSize { width: u16, height: u16 },
    Enter,
    Esc,
    MoveSelection { lines: i32 },
    SelectFirst,
    SelectLast,
    Scroll { lines: i32 },
    PgUp,
    PgDn,
    Tab,
    MouseTarget(MouseCommand),
    KeepOne,
    KeepAll,
    Delete,
    RevealInFinder,
    Quit,
}

/// Sub-command carried by a mouse click, resolved by the renderer's
/// hit-testing against the targets registered during the last frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MouseCommand {
    SelectFile(FileId),
    SelectFolder(TreePath),
    SortColumn(SortColumn),
}
