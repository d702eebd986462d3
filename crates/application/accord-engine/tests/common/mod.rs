#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use accord_core::{FileId, FileMeta, Hash, Name, Root, TreePath};
use accord_engine::{
    ArchiveScanner, Event, FileCommand, MouseCommand, Position, Reconciler, Renderer, Screen,
    Size, Style, ViewFile,
};

pub type CommandLog = Arc<Mutex<Vec<FileCommand>>>;

pub struct StubScanner {
    log: CommandLog,
}

impl ArchiveScanner for StubScanner {
    fn send(&self, cmd: FileCommand) {
        self.log.lock().unwrap().push(cmd);
    }
}

/// Reconciler over stub scanners that record every command per root.
pub fn reconciler(roots: &[&str]) -> (Reconciler, HashMap<Root, CommandLog>) {
    let mut logs = HashMap::new();
    let mut scanners: Vec<(Root, Box<dyn ArchiveScanner>)> = Vec::new();
    for r in roots {
        let root = Root::from(*r);
        let log: CommandLog = Arc::default();
        logs.insert(root.clone(), log.clone());
        scanners.push((root, Box::new(StubScanner { log })));
    }
    (Reconciler::new(scanners), logs)
}

pub fn name(full: &str) -> Name {
    match full.rsplit_once('/') {
        Some((dir, base)) => Name::new(TreePath::new(dir), base),
        None => Name::new(TreePath::root(), full),
    }
}

pub fn id(root: &str, full: &str) -> FileId {
    FileId::new(Root::from(root), name(full))
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub fn meta(root: &str, full: &str, size: u64, secs: i64) -> FileMeta {
    FileMeta::new(id(root, full), size, ts(secs))
}

pub fn scan(recon: &mut Reconciler, root: &str, metas: Vec<FileMeta>) {
    recon.handle_event(Event::ArchiveScanned {
        root: Root::from(root),
        metas,
    });
}

pub fn hash(recon: &mut Reconciler, root: &str, full: &str, h: &str) {
    recon.handle_event(Event::FileHashed {
        id: id(root, full),
        hash: Hash::from(h),
    });
}

pub fn finish_hash(recon: &mut Reconciler, root: &str) {
    recon.handle_event(Event::ArchiveHashed {
        root: Root::from(root),
    });
}

/// Scan and fully hash one root: `files` is (full name, hash, size, mtime).
pub fn scan_and_hash(recon: &mut Reconciler, root: &str, files: &[(&str, &str, u64, i64)]) {
    let metas = files
        .iter()
        .map(|(full, _, size, secs)| meta(root, full, *size, *secs))
        .collect();
    scan(recon, root, metas);
    for (full, h, _, _) in files {
        hash(recon, root, full, h);
    }
    finish_hash(recon, root);
}

pub fn select(recon: &mut Reconciler, root: &str, full: &str) {
    recon.handle_event(Event::MouseTarget(MouseCommand::SelectFile(id(root, full))));
}

pub fn enter_folder(recon: &mut Reconciler, path: &str) {
    recon.handle_event(Event::MouseTarget(MouseCommand::SelectFolder(
        TreePath::from(path),
    )));
}

pub fn find<'a>(screen: &'a Screen, base: &str) -> Option<&'a ViewFile> {
    screen.entries.iter().find(|e| e.id().base() == base)
}

pub fn bases(screen: &Screen) -> Vec<String> {
    screen
        .entries
        .iter()
        .map(|e| e.id().base().to_string())
        .collect()
}

pub struct NullRenderer {
    style: Style,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self {
            style: Style::default(),
        }
    }
}

impl Renderer for NullRenderer {
    fn reset(&mut self) {}
    fn add_mouse_target(&mut self, _target: MouseCommand, _pos: Position, _size: Size) {}
    fn add_scroll_area(&mut self, _step: i32, _pos: Position, _size: Size) {}
    fn set_style(&mut self, style: Style) {
        self.style = style;
    }
    fn current_style(&self) -> Style {
        self.style
    }
    fn text(&mut self, _runes: &str, _pos: Position) {}
    fn show(&mut self) {}
    fn stop(&mut self) {}
}
