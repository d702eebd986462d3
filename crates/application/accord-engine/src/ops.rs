use accord_core::{FileId, Name, Root};

use crate::commands::FileCommand;

/// A requested filesystem mutation. Ops live in the reconciler's pending
/// log from the moment they are sent to a scanner until the matching
/// `FilesHandled` acknowledgment arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    Copy { from: FileId, to: FileId, size: u64 },
    Rename { from: FileId, to: Name },
    Delete { id: FileId },
}

impl FileOp {
    /// The wire command for this op. Acknowledgments are matched against
    /// pending ops by this value, so the copy size never participates.
    pub fn command(&self) -> FileCommand {
        match self {
            FileOp::Copy { from, to, .. } => FileCommand::CopyFile {
                from: from.clone(),
                to: to.clone(),
            },
            FileOp::Rename { from, to } => FileCommand::RenameFile {
                from: from.clone(),
                to: to.clone(),
            },
            FileOp::Delete { id } => FileCommand::DeleteFile { id: id.clone() },
        }
    }

    /// The archive whose actor executes this op. Copies are executed by
    /// the destination: no two actors ever write the same root.
    pub fn executing_root(&self) -> &Root {
        match self {
            FileOp::Copy { to, .. } => &to.root,
            FileOp::Rename { from, .. } => &from.root,
            FileOp::Delete { id } => &id.root,
        }
    }
}
