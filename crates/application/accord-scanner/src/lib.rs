use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use accord_core::{FileId, FileMeta, Hash, Name, Root, TreePath};
use accord_engine::{ArchiveScanner, Event, EventSender, FileCommand, FileOp};

pub mod sim;

const COMMAND_MAILBOX_CAPACITY: usize = 32;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
const COPY_BUFFER: usize = 64 * 1024;
const HASH_BUFFER: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("non-UTF-8 path under {0}")]
    NonUtf8Path(String),
    #[error("target already exists with different content: {0}")]
    TargetExists(Utf8PathBuf),
}

/// Mailbox handle for one archive's worker thread. Commands are processed
/// strictly in submission order; dropping every handle lets the worker
/// finish its in-flight command and exit.
#[derive(Clone)]
pub struct ScannerHandle {
    tx: mpsc::Sender<FileCommand>,
}

impl ArchiveScanner for ScannerHandle {
    fn send(&self, cmd: FileCommand) {
        if self.tx.blocking_send(cmd).is_err() {
            warn!("command for a stopped scanner dropped");
        }
    }
}

/// Spawn the filesystem actor for one archive root. The root string is
/// the absolute path of the directory tree.
pub fn spawn_scanner(root: Root, events: EventSender) -> std::io::Result<ScannerHandle> {
    let (tx, rx) = mpsc::channel(COMMAND_MAILBOX_CAPACITY);
    let name = format!(
        "accord-scan-{}",
        Utf8Path::new(root.as_str()).file_name().unwrap_or("root")
    );
    thread::Builder::new().name(name).spawn(move || {
        ScannerWorker::new(root, events).run(rx);
    })?;
    Ok(ScannerHandle { tx })
}

struct ScannerWorker {
    root: Root,
    dir: Utf8PathBuf,
    events: EventSender,
    scanned: bool,
}

impl ScannerWorker {
    fn new(root: Root, events: EventSender) -> Self {
        let dir = Utf8PathBuf::from(root.as_str());
        Self {
            root,
            dir,
            events,
            scanned: false,
        }
    }

    fn run(mut self, mut rx: mpsc::Receiver<FileCommand>) {
        while let Some(cmd) = rx.blocking_recv() {
            self.handle(cmd);
        }
        debug!(root = %self.root, "scanner stopped");
    }

    fn handle(&mut self, cmd: FileCommand) {
        match cmd {
            FileCommand::ScanArchive => self.scan_archive(),
            FileCommand::HashArchive => self.hash_archive(),
            FileCommand::CopyFile { from, to } => self.copy_file(from, to),
            FileCommand::RenameFile { from, to } => self.rename_file(from, to),
            FileCommand::DeleteFile { id } => self.delete_file(id),
        }
    }

    fn emit(&self, event: Event) {
        if self.events.blocking_send(event).is_err() {
            debug!(root = %self.root, "event bus closed");
        }
    }

    fn emit_error(&self, op: Option<FileOp>, message: String) {
        self.emit(Event::Error {
            root: Some(self.root.clone()),
            op,
            message,
        });
    }

    // --- Scanning ---

    fn scan_archive(&mut self) {
        if self.scanned {
            warn!(root = %self.root, "repeated scan command ignored");
            return;
        }
        self.scanned = true;

        match self.collect_metas() {
            Ok(metas) => {
                info!(root = %self.root, files = metas.len(), "scanned");
                self.emit(Event::ArchiveScanned {
                    root: self.root.clone(),
                    metas,
                });
            }
            Err(err) => self.emit_error(None, format!("scan failed: {err}")),
        }
    }

    fn collect_metas(&self) -> Result<Vec<FileMeta>, ScannerError> {
        let mut metas = Vec::new();
        for entry in WalkDir::new(self.dir.as_std_path()) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                return Err(ScannerError::NonUtf8Path(self.root.to_string()));
            };
            let rel = path.strip_prefix(&self.dir).unwrap_or(path);
            let meta = entry.metadata()?;
            metas.push(FileMeta::new(
                FileId::new(self.root.clone(), rel_name(rel)),
                meta.len(),
                mod_time(&meta),
            ));
        }
        Ok(metas)
    }

    // --- Hashing ---

    fn hash_archive(&self) {
        let metas = match self.collect_metas() {
            Ok(metas) => metas,
            Err(err) => {
                self.emit_error(None, format!("hash pass failed: {err}"));
                return;
            }
        };
        let total: u64 = metas.iter().map(|m| m.size).sum();

        let hashed = Arc::new(AtomicU64::new(0));
        let done = Arc::new(AtomicBool::new(false));

        // Sampling monitor: the parallel workers only bump the counter, so
        // the published totals stay monotonic per root.
        let monitor = {
            let hashed = hashed.clone();
            let done = done.clone();
            let events = self.events.clone();
            let root = self.root.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let _ = events.blocking_send(Event::HashingProgress {
                        root: root.clone(),
                        hashed: hashed.load(Ordering::Relaxed),
                    });
                    thread::sleep(PROGRESS_INTERVAL);
                }
            })
        };

        metas.par_iter().for_each(|meta| {
            let path = self.abs_path(&meta.id);
            match hash_file(&path) {
                Ok(hash) => {
                    hashed.fetch_add(meta.size, Ordering::Relaxed);
                    self.emit(Event::FileHashed {
                        id: meta.id.clone(),
                        hash,
                    });
                }
                Err(err) => {
                    self.emit_error(None, format!("{}: {err}", meta.id.name));
                }
            }
        });

        done.store(true, Ordering::Relaxed);
        let _ = monitor.join();

        self.emit(Event::HashingProgress {
            root: self.root.clone(),
            hashed: total,
        });
        self.emit(Event::ArchiveHashed {
            root: self.root.clone(),
        });
    }

    // --- Mutations ---

    fn copy_file(&self, from: FileId, to: FileId) {
        match self.do_copy(&from, &to) {
            Ok(size) => self.emit(Event::FilesHandled {
                op: FileOp::Copy { from, to, size },
            }),
            Err(err) => {
                let message = format!("copy {} -> {}: {err}", from, to);
                self.emit_error(Some(FileOp::Copy { from, to, size: 0 }), message);
            }
        }
    }

    fn do_copy(&self, from: &FileId, to: &FileId) -> Result<u64, ScannerError> {
        let src = abs_path_of(&from.root, &from.name);
        let dst = self.abs_path(to);

        let src_meta = fs::metadata(&src)?;
        if let Ok(dst_meta) = fs::metadata(&dst) {
            // Re-issued copy onto an identical target is a no-op. The copy
            // preserves the source mod-time, so size plus mtime identifies
            // a target this actor already wrote.
            let src_mtime = filetime::FileTime::from_last_modification_time(&src_meta);
            let dst_mtime = filetime::FileTime::from_last_modification_time(&dst_meta);
            if dst_meta.len() == src_meta.len() && dst_mtime == src_mtime {
                return Ok(src_meta.len());
            }
            return Err(ScannerError::TargetExists(dst));
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut reader = BufReader::new(File::open(&src)?);
        let mut writer = BufWriter::new(File::create(&dst)?);
        let mut buf = [0u8; COPY_BUFFER];
        let mut copied = 0u64;
        let mut last_report = Instant::now();
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            copied += n as u64;
            if last_report.elapsed() >= PROGRESS_INTERVAL {
                self.emit(Event::CopyingProgress { copied });
                last_report = Instant::now();
            }
        }
        writer.flush()?;

        let mtime = filetime::FileTime::from_last_modification_time(&src_meta);
        filetime::set_file_mtime(dst.as_std_path(), mtime)?;

        self.emit(Event::CopyingProgress { copied });
        Ok(copied)
    }

    fn rename_file(&self, from: FileId, to: Name) {
        match self.do_rename(&from, &to) {
            Ok(()) => self.emit(Event::FilesHandled {
                op: FileOp::Rename { from, to },
            }),
            Err(err) => {
                let message = format!("rename {} -> {}: {err}", from, to);
                self.emit_error(Some(FileOp::Rename { from, to }), message);
            }
        }
    }

    fn do_rename(&self, from: &FileId, to: &Name) -> Result<(), ScannerError> {
        let src = self.abs_path(from);
        let dst = abs_path_of(&from.root, to);
        if src == dst {
            return Ok(());
        }
        // Re-issued rename: the source is gone and the target is in place.
        if !src.exists() && dst.exists() {
            return Ok(());
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&src, &dst)?;
        self.prune_empty_dirs(src.parent());
        Ok(())
    }

    fn delete_file(&self, id: FileId) {
        let path = self.abs_path(&id);
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_dirs(path.parent());
                self.emit(Event::FilesHandled {
                    op: FileOp::Delete { id },
                });
            }
            // Re-issued delete on a missing target is a no-op.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.emit(Event::FilesHandled {
                    op: FileOp::Delete { id },
                });
            }
            Err(err) => {
                let message = format!("delete {id}: {err}");
                self.emit_error(Some(FileOp::Delete { id }), message);
            }
        }
    }

    /// Remove directories left empty by a rename or delete, walking up to
    /// (but never including) the archive root.
    fn prune_empty_dirs(&self, start: Option<&Utf8Path>) {
        let mut dir = start.map(Utf8Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.dir || !current.starts_with(&self.dir) {
                break;
            }
            if fs::remove_dir(current.as_std_path()).is_err() {
                break;
            }
            dir = current.parent().map(Utf8Path::to_path_buf);
        }
    }

    fn abs_path(&self, id: &FileId) -> Utf8PathBuf {
        self.dir.join(id.name.full_name())
    }
}

fn abs_path_of(root: &Root, name: &Name) -> Utf8PathBuf {
    Utf8PathBuf::from(root.as_str()).join(name.full_name())
}

fn rel_name(rel: &Utf8Path) -> Name {
    let full = rel.as_str().replace('\\', "/");
    match full.rsplit_once('/') {
        Some((dir, base)) => Name::new(TreePath::new(dir), base),
        None => Name::new(TreePath::root(), full),
    }
}

fn mod_time(meta: &fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Streaming MD5 of one file's content.
pub fn hash_file(path: &Utf8Path) -> Result<Hash, ScannerError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut context = md5::Context::new();
    let mut buf = [0u8; HASH_BUFFER];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(Hash::new(format!("{:X}", context.finalize())))
}
