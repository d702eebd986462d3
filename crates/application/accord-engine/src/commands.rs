use accord_core::{FileId, Name};

/// Commands accepted by an archive scanner actor. Processed strictly in
/// submission order; each command is answered by exactly one terminal
/// event (`ArchiveScanned`, `ArchiveHashed`, or `FilesHandled`), preceded
/// by zero or more progress events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCommand {
    ScanArchive,
    HashArchive,
    CopyFile { from: FileId, to: FileId },
    RenameFile { from: FileId, to: Name },
    DeleteFile { id: FileId },
}
