//! Scripted in-memory scanner used by the `-sim` / `-sim2` modes and the
//! integration tests. Three fixed roots share one tree store; mutation
//! commands rewrite the store and answer with the same event protocol as
//! the filesystem actor. Everything is deterministic: sizes and mod-times
//! are derived from the scripted content addresses.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use accord_core::{FileId, FileMeta, Hash, Name, Root, TreePath};
use accord_engine::{Event, EventSender, FileCommand, FileOp};

use crate::ScannerHandle;

pub const SIM_ROOTS: [&str; 3] = ["origin", "copy 1", "copy 2"];

const MAILBOX_CAPACITY: usize = 32;
const STAGED_STEP: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
struct SimFile {
    size: u64,
    mod_time: DateTime<Utc>,
    hash: Hash,
}

type Tree = BTreeMap<String, SimFile>;

struct SimState {
    trees: HashMap<Root, Tree>,
}

/// The shared scripted filesystem. One instance backs all three roots.
pub struct SimFs {
    state: Arc<Mutex<SimState>>,
    events: EventSender,
    staged: bool,
}

impl SimFs {
    /// `staged` staggers hashing and copying with progress steps and short
    /// sleeps (the `-sim` mode); otherwise everything completes instantly
    /// (`-sim2`).
    pub fn new(events: EventSender, staged: bool) -> Self {
        let mut trees = HashMap::new();
        for (root, files) in scripted_trees() {
            let tree = files
                .iter()
                .map(|(name, hash)| (name.to_string(), sim_file(hash)))
                .collect();
            trees.insert(root, tree);
        }
        Self {
            state: Arc::new(Mutex::new(SimState { trees })),
            events,
            staged,
        }
    }

    pub fn roots() -> Vec<Root> {
        SIM_ROOTS.iter().map(|r| Root::from(*r)).collect()
    }

    pub fn scanner(&self, root: &Root) -> std::io::Result<ScannerHandle> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let worker = SimWorker {
            root: root.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
            staged: self.staged,
            scanned: false,
        };
        thread::Builder::new()
            .name(format!("accord-sim-{root}"))
            .spawn(move || worker.run(rx))?;
        Ok(ScannerHandle { tx })
    }
}

struct SimWorker {
    root: Root,
    events: EventSender,
    state: Arc<Mutex<SimState>>,
    staged: bool,
    scanned: bool,
}

impl SimWorker {
    fn run(mut self, mut rx: mpsc::Receiver<FileCommand>) {
        while let Some(cmd) = rx.blocking_recv() {
            self.handle(cmd);
        }
        debug!(root = %self.root, "sim scanner stopped");
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
        let _ = self.events.blocking_send(event);
    }

    fn snapshot(&self) -> Vec<(String, SimFile)> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .trees
            .get(&self.root)
            .map(|tree| {
                tree.iter()
                    .map(|(name, file)| (name.clone(), file.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn scan_archive(&mut self) {
        if self.scanned {
            warn!(root = %self.root, "repeated scan command ignored");
            return;
        }
        self.scanned = true;

        let metas = self
            .snapshot()
            .into_iter()
            .map(|(name, file)| {
                FileMeta::new(
                    FileId::new(self.root.clone(), split_name(&name)),
                    file.size,
                    file.mod_time,
                )
            })
            .collect();
        self.emit(Event::ArchiveScanned {
            root: self.root.clone(),
            metas,
        });
    }

    fn hash_archive(&self) {
        let files = self.snapshot();
        let total: u64 = files.iter().map(|(_, f)| f.size).sum();
        let mut hashed: u64 = 0;

        for (idx, (name, file)) in files.iter().enumerate() {
            let progressive = self.staged && idx % 2 == 1;
            if progressive {
                for step in 1..=4u64 {
                    self.emit(Event::HashingProgress {
                        root: self.root.clone(),
                        hashed: hashed + file.size * step / 4,
                    });
                    thread::sleep(STAGED_STEP);
                }
            }
            hashed += file.size;
            self.emit(Event::FileHashed {
                id: FileId::new(self.root.clone(), split_name(name)),
                hash: file.hash.clone(),
            });
            self.emit(Event::HashingProgress {
                root: self.root.clone(),
                hashed,
            });
        }

        self.emit(Event::HashingProgress {
            root: self.root.clone(),
            hashed: total,
        });
        self.emit(Event::ArchiveHashed {
            root: self.root.clone(),
        });
    }

    fn copy_file(&self, from: FileId, to: FileId) {
        let source = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state
                .trees
                .get(&from.root)
                .and_then(|tree| tree.get(&from.name.full_name()))
                .cloned()
        };
        let Some(source) = source else {
            let message = format!("copy {from}: no such file");
            self.emit(Event::Error {
                root: Some(self.root.clone()),
                op: Some(FileOp::Copy { from, to, size: 0 }),
                message,
            });
            return;
        };

        let existing = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state
                .trees
                .get(&self.root)
                .and_then(|tree| tree.get(&to.name.full_name()))
                .cloned()
        };
        if let Some(existing) = existing {
            if existing.hash == source.hash {
                // Identical target already in place.
                self.emit(Event::FilesHandled {
                    op: FileOp::Copy {
                        from,
                        to,
                        size: source.size,
                    },
                });
                return;
            }
            let message = format!("copy {to}: target exists with different content");
            self.emit(Event::Error {
                root: Some(self.root.clone()),
                op: Some(FileOp::Copy { from, to, size: 0 }),
                message,
            });
            return;
        }

        if self.staged {
            let chunk = (source.size / 5).max(1);
            let mut copied = 0u64;
            while copied < source.size {
                copied = (copied + chunk).min(source.size);
                self.emit(Event::CopyingProgress { copied });
                thread::sleep(STAGED_STEP);
            }
        } else {
            self.emit(Event::CopyingProgress {
                copied: source.size,
            });
        }

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tree) = state.trees.get_mut(&self.root) {
                tree.insert(to.name.full_name(), source.clone());
            }
        }
        self.emit(Event::FilesHandled {
            op: FileOp::Copy {
                from,
                to,
                size: source.size,
            },
        });
    }

    fn rename_file(&self, from: FileId, to: Name) {
        let renamed = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match state.trees.get_mut(&self.root) {
                Some(tree) => match tree.remove(&from.name.full_name()) {
                    Some(file) => {
                        tree.insert(to.full_name(), file);
                        true
                    }
                    // Already renamed: no-op as long as the target exists.
                    None => tree.contains_key(&to.full_name()),
                },
                None => false,
            }
        };
        if renamed {
            self.emit(Event::FilesHandled {
                op: FileOp::Rename { from, to },
            });
        } else {
            let message = format!("rename {from}: no such file");
            self.emit(Event::Error {
                root: Some(self.root.clone()),
                op: Some(FileOp::Rename { from, to }),
                message,
            });
        }
    }

    fn delete_file(&self, id: FileId) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(tree) = state.trees.get_mut(&self.root) {
                tree.remove(&id.name.full_name());
            }
        }
        self.emit(Event::FilesHandled {
            op: FileOp::Delete { id },
        });
    }
}

fn split_name(full: &str) -> Name {
    match full.rsplit_once('/') {
        Some((dir, base)) => Name::new(TreePath::new(dir), base),
        None => Name::new(TreePath::root(), full),
    }
}

fn sim_file(hash: &str) -> SimFile {
    let seed: u64 = hash.bytes().map(u64::from).sum();
    let size = seed * 7919 % 90_000_000 + 10_000;
    // 2001-01-01T00:00:00Z plus a hash-derived offset, so identical
    // content carries identical mod-times across roots.
    let secs = 978_307_200 + (seed * 104_729 % 694_000_000) as i64;
    SimFile {
        size,
        mod_time: DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH),
        hash: Hash::from(hash),
    }
}

fn scripted_trees() -> Vec<(Root, Vec<(&'static str, &'static str)>)> {
    vec![
        (
            Root::from("origin"),
            vec![
                ("readme.txt", "ax01"),
                ("a/b/c/photo.jpg", "dd77"),
                ("a/b/e/letter.doc", "gg42"),
                ("a/b/e/notes.md", "tt19"),
                ("photo.jpg", "dd77"),
                ("q/w/e/r/t/deep.dat", "qq88"),
                ("music.flac", "yy55"),
                ("backup.tar", "bb00"),
                ("video.mp4", "vv66"),
                ("report.pdf", "rr77"),
            ],
        ),
        (
            Root::from("copy 1"),
            vec![
                ("readme.txt", "ax01"),
                ("a/b/c/scan.jpg", "ll31"),
                ("a/b/e/letter.doc", "dd77"),
                ("a/b/e/notes.md", "tt19"),
                ("photo.jpg", "mm09"),
                ("extra.doc", "gg42"),
                ("a/b/c/photo.jpg", "dd77"),
                ("old/photo-2.jpg", "dd77"),
                ("x/y/misc.bin", "zz13"),
                ("music.flac", "yy55"),
                ("archive.tar", "bb00"),
                ("clips/video.mp4", "vv99"),
            ],
        ),
        (
            Root::from("copy 2"),
            vec![
                ("readme.txt", "ax01"),
                ("a/b/c/image.jpg", "dd77"),
                ("a/b/e/copy.doc", "gg42"),
                ("a/b/e/notes.md", "tt19"),
                ("stray", "as55"),
                ("q/w/e/r/t/deep.dat", "kk12"),
                ("report.pdf", "rr78"),
                ("video.mp4", "vv66"),
            ],
        ),
    ]
}
