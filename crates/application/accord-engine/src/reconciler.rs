use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use accord_core::{FileId, FileKind, FileMeta, FileState, Hash, Root, ScanPhase, TreePath};
use chrono::DateTime;
use tracing::{debug, warn};

use crate::archive::Archives;
use crate::bus::EventReceiver;
use crate::commands::FileCommand;
use crate::events::{Event, MouseCommand};
use crate::folders::FolderView;
use crate::ops::FileOp;
use crate::ports::{ArchiveScanner, Renderer};
use crate::projector::{self, ProgressInfo, ViewFile};
use crate::view::{self, Screen};

const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);

/// Rows above and below the file pane: title, column header, status line.
/// Archive gauges add one more row each.
const CHROME_ROWS: u16 = 3;

/// The reconciliation state machine. Owns every piece of mutable model
/// state; all communication with scanners and the renderer goes through
/// handles. Single-threaded: the whole struct lives on the loop thread.
pub struct Reconciler {
    archives: Archives,
    by_hash: HashMap<Hash, HashSet<FileId>>,
    folders: HashMap<TreePath, FolderView>,
    current_path: TreePath,

    entries: Vec<ViewFile>,
    pending_files: usize,
    duplicate_files: usize,
    absent_files: usize,
    origin_hashed: bool,

    screen_width: u16,
    screen_height: u16,
    last_click: Option<(FileId, Instant)>,

    pending_ops: Vec<FileOp>,
    copy_total: u64,
    copied_base: u64,
    copying: u64,

    errors: Vec<String>,
    feedback: Option<String>,
    quit: bool,
}

impl Reconciler {
    /// Create one archive per root (first root is origin) and kick off
    /// the metadata scans.
    pub fn new(scanners: Vec<(Root, Box<dyn ArchiveScanner>)>) -> Self {
        let archives = Archives::new(scanners);
        for (_, archive) in archives.iter() {
            archive.send(FileCommand::ScanArchive);
        }
        Self {
            archives,
            by_hash: HashMap::new(),
            folders: HashMap::new(),
            current_path: TreePath::root(),
            entries: Vec::new(),
            pending_files: 0,
            duplicate_files: 0,
            absent_files: 0,
            origin_hashed: false,
            screen_width: 80,
            screen_height: 24,
            last_click: None,
            pending_ops: Vec::new(),
            copy_total: 0,
            copied_base: 0,
            copying: 0,
            errors: Vec::new(),
            feedback: None,
            quit: false,
        }
    }

    /// The main loop: block for one event, drain at most one more that is
    /// already waiting, then project and render a fresh frame. Bounds the
    /// render frequency while keeping latency to a single event.
    pub fn run(mut self, events: &mut EventReceiver, renderer: &mut dyn Renderer) {
        while !self.quit {
            let Some(event) = events.blocking_recv() else {
                break;
            };
            self.handle_event(event);
            if let Ok(event) = events.try_recv() {
                self.handle_event(event);
            }

            let screen = self.compose();
            renderer.reset();
            view::draw(&screen, renderer);
            renderer.show();
        }
        renderer.stop();
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::ArchiveScanned { root, metas } => self.archive_scanned(root, metas),
            Event::FileHashed { id, hash } => self.file_hashed(id, hash),
            Event::ArchiveHashed { root } => self.archive_hashed(root),
            Event::HashingProgress { root, hashed } => self.hashing_progress(root, hashed),
            Event::CopyingProgress { copied } => self.copying = copied,
            Event::FilesHandled { op } => self.files_handled(op),
            Event::Error { root, op, message } => self.record_error(root, op, message),

            Event::ScreenSize { width, height } => {
                self.screen_width = width;
                self.screen_height = height;
            }
            Event::Enter => self.enter(),
            Event::Esc => self.esc(),
            Event::MoveSelection { lines } => self.move_selection(lines),
            Event::SelectFirst => self.select_first(),
            Event::SelectLast => self.select_last(),
            Event::Scroll { lines } => self.scroll(lines),
            Event::PgUp => {
                let page = self.pane_height() as i32;
                self.shift_offset(-page);
                self.move_selection(-page);
            }
            Event::PgDn => {
                let page = self.pane_height() as i32;
                self.shift_offset(page);
                self.move_selection(page);
            }
            Event::Tab => self.tab(),
            Event::MouseTarget(cmd) => self.mouse_target(cmd),
            Event::KeepOne => self.keep_selected(),
            Event::KeepAll => {
                self.feedback = Some("keep-all is not implemented".to_string());
            }
            Event::Delete => self.delete_selected(),
            Event::RevealInFinder => self.reveal_selected(),
            Event::Quit => self.quit = true,
        }
    }

    // --- Scanner events ---

    fn archive_scanned(&mut self, root: Root, metas: Vec<FileMeta>) {
        let Some(archive) = self.archives.get_mut(&root) else {
            warn!(%root, "scan result for unknown archive");
            return;
        };
        if archive.phase != ScanPhase::Scanning {
            warn!(%root, "duplicate scan result dropped");
            return;
        }

        archive.total_size = metas.iter().map(|m| m.size).sum();
        archive.files = metas
            .into_iter()
            .map(|meta| (meta.id.name.clone(), meta))
            .collect();
        archive.phase = ScanPhase::Hashing;
        debug!(%root, files = archive.files.len(), "archive scanned");

        for meta in archive.files.values() {
            if !meta.hash.is_empty() {
                self.by_hash
                    .entry(meta.hash.clone())
                    .or_default()
                    .insert(meta.id.clone());
            }
        }
        if let Some(archive) = self.archives.get(&root) {
            archive.send(FileCommand::HashArchive);
        }
    }

    fn file_hashed(&mut self, id: FileId, hash: Hash) {
        let Some(meta) = self
            .archives
            .get_mut(&id.root)
            .and_then(|a| a.files.get_mut(&id.name))
        else {
            warn!(%id, "hash for unknown file");
            return;
        };
        if meta.hash == hash {
            return;
        }
        let old = std::mem::replace(&mut meta.hash, hash.clone());
        if !old.is_empty() {
            warn!(%id, "file re-hashed with a different content address");
            remove_from_index(&mut self.by_hash, &old, &id);
        }
        self.by_hash.entry(hash).or_default().insert(id);
    }

    fn archive_hashed(&mut self, root: Root) {
        if let Some(archive) = self.archives.get_mut(&root) {
            archive.phase = ScanPhase::Hashed;
            archive.total_hashed = archive.total_size;
            debug!(%root, "archive hashed");
        }
    }

    fn hashing_progress(&mut self, root: Root, hashed: u64) {
        if let Some(archive) = self.archives.get_mut(&root) {
            // Monotonic per (root, phase); late samples never move it back.
            archive.total_hashed = archive.total_hashed.max(hashed);
        }
    }

    fn files_handled(&mut self, op: FileOp) {
        let cmd = op.command();
        match self.pending_ops.iter().position(|p| p.command() == cmd) {
            Some(pos) => {
                self.pending_ops.remove(pos);
            }
            None => debug!(?op, "acknowledgment without a pending op"),
        }

        match op {
            FileOp::Rename { from, to } => {
                let Some(mut meta) = self
                    .archives
                    .get_mut(&from.root)
                    .and_then(|a| a.files.remove(&from.name))
                else {
                    warn!(%from, "rename acknowledged for a file not in the index");
                    return;
                };
                if !meta.hash.is_empty() {
                    remove_from_index(&mut self.by_hash, &meta.hash.clone(), &from);
                }
                meta.id.name = to.clone();
                let new_hash = meta.hash.clone();
                if !new_hash.is_empty() {
                    self.by_hash
                        .entry(new_hash.clone())
                        .or_default()
                        .insert(meta.id.clone());
                }
                let displaced = self
                    .archives
                    .get_mut(&from.root)
                    .and_then(|archive| archive.files.insert(to, meta));
                if let Some(prev) = displaced {
                    // A file displaced from the target name leaves the index
                    // with it, unless it shared the content just moved in.
                    if !prev.hash.is_empty() && prev.hash != new_hash {
                        remove_from_index(&mut self.by_hash, &prev.hash, &prev.id);
                    }
                }
            }
            FileOp::Delete { id } => {
                let Some(meta) = self
                    .archives
                    .get_mut(&id.root)
                    .and_then(|a| a.files.remove(&id.name))
                else {
                    debug!(%id, "delete acknowledged for a file not in the index");
                    return;
                };
                if !meta.hash.is_empty() {
                    remove_from_index(&mut self.by_hash, &meta.hash, &id);
                }
            }
            FileOp::Copy { from, to, size } => {
                let source = self
                    .archives
                    .get(&from.root)
                    .and_then(|a| a.files.get(&from.name));
                let (hash, mod_time) = match source {
                    Some(meta) => (meta.hash.clone(), meta.mod_time),
                    None => {
                        warn!(%from, "copy source vanished from the index");
                        (Hash::default(), DateTime::UNIX_EPOCH)
                    }
                };
                let meta = FileMeta {
                    id: to.clone(),
                    size,
                    mod_time,
                    hash: hash.clone(),
                };
                let displaced = self.archives.get_mut(&to.root).and_then(|archive| {
                    archive.total_size += size;
                    archive.files.insert(to.name.clone(), meta)
                });
                if let Some(prev) = displaced {
                    if !prev.hash.is_empty() && prev.hash != hash {
                        remove_from_index(&mut self.by_hash, &prev.hash, &prev.id);
                    }
                }
                if !hash.is_empty() {
                    self.by_hash.entry(hash).or_default().insert(to);
                }
                self.copied_base += size;
                self.copying = 0;
                if self.copied_base >= self.copy_total {
                    self.copy_total = 0;
                    self.copied_base = 0;
                }
            }
        }
    }

    fn record_error(&mut self, root: Option<Root>, op: Option<FileOp>, message: String) {
        warn!(?root, %message, "scanner error");
        if let Some(op) = op {
            // The mutation did not happen; forget it so it can be reissued.
            let cmd = op.command();
            if let Some(pos) = self.pending_ops.iter().position(|p| p.command() == cmd) {
                if let FileOp::Copy { size, .. } = &self.pending_ops[pos] {
                    self.copy_total = self.copy_total.saturating_sub(*size);
                    self.copying = 0;
                    if self.copied_base >= self.copy_total {
                        self.copy_total = 0;
                        self.copied_base = 0;
                    }
                }
                self.pending_ops.remove(pos);
            }
        }
        match root {
            Some(root) => self.errors.push(format!("{root}: {message}")),
            None => self.errors.push(message),
        }
    }

    // --- Input events ---

    fn enter(&mut self) {
        let Some(entry) = self.selected_entry().cloned() else {
            return;
        };
        match entry.kind {
            FileKind::Folder => {
                self.current_path = entry.meta.id.path().join(entry.meta.id.base());
                let folder = self.current_folder();
                folder.selected_id = None;
                folder.selected_idx = 0;
                folder.offset_idx = 0;
            }
            FileKind::Regular => self.open_external(&entry.meta.id.abs_string()),
        }
    }

    fn esc(&mut self) {
        if !self.current_path.is_root() {
            self.current_path = self.current_path.parent();
        }
    }

    fn mouse_target(&mut self, cmd: MouseCommand) {
        match cmd {
            MouseCommand::SelectFile(id) => {
                let now = Instant::now();
                let double_click = matches!(
                    &self.last_click,
                    Some((last, at)) if *last == id && now.duration_since(*at) < DOUBLE_CLICK_WINDOW
                );
                self.last_click = Some((id.clone(), now));

                if let Some(pos) = self.entries.iter().position(|e| *e.id() == id) {
                    self.set_selected_idx(pos as isize);
                    self.make_selected_visible();
                }
                if double_click {
                    self.enter();
                }
            }
            MouseCommand::SelectFolder(path) => {
                self.current_path = path;
            }
            MouseCommand::SortColumn(column) => {
                self.current_folder().sort_by(column);
            }
        }
    }

    /// Cycle the selection across all origin files sharing the selected
    /// duplicate's hash, in case-folded name order, wrapping at the end.
    fn tab(&mut self) {
        let Some(selected) = self.selected_entry().cloned() else {
            return;
        };
        if selected.kind != FileKind::Regular || selected.state != FileState::Duplicate {
            return;
        }

        let origin = self.archives.origin().clone();
        let mut same_hash: Vec<FileId> = self
            .by_hash
            .get(&selected.meta.hash)
            .map(|ids| ids.iter().filter(|id| id.root == origin).cloned().collect())
            .unwrap_or_default();
        if same_hash.is_empty() {
            return;
        }
        same_hash.sort_by_key(|id| id.name.full_name().to_lowercase());

        let pos = same_hash
            .iter()
            .position(|id| *id == selected.meta.id)
            .unwrap_or(0);
        let next = same_hash[(pos + 1) % same_hash.len()].clone();

        self.current_path = next.path().clone();
        let folder = self.current_folder();
        folder.selected_id = Some(next);
    }

    /// Resolve the selected duplicate set by keeping the selected origin
    /// file: the other origin copies are deleted, and every copy archive
    /// is driven to hold the content under the kept name.
    fn keep_selected(&mut self) {
        let Some(selected) = self.selected_entry().cloned() else {
            return;
        };
        if selected.kind != FileKind::Regular || selected.state != FileState::Duplicate {
            return;
        }
        let kept = selected.meta;
        let origin = self.archives.origin().clone();

        let mut ops = Vec::new();

        let mut victims: Vec<FileId> = self
            .by_hash
            .get(&kept.hash)
            .map(|ids| {
                ids.iter()
                    .filter(|id| id.root == origin && **id != kept.id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        victims.sort();
        for id in victims {
            ops.push(FileOp::Delete { id });
        }

        for root in self.archives.copies().to_vec() {
            let Some(archive) = self.archives.get(&root) else {
                continue;
            };
            let already_mirrored = archive
                .files
                .get(&kept.id.name)
                .is_some_and(|meta| meta.hash == kept.hash);
            if already_mirrored {
                continue;
            }

            let mut candidates: Vec<&FileMeta> = archive
                .files
                .values()
                .filter(|meta| meta.hash == kept.hash)
                .collect();
            candidates.sort_by(|a, b| a.id.name.cmp(&b.id.name));

            match candidates.first() {
                Some(present) => ops.push(FileOp::Rename {
                    from: present.id.clone(),
                    to: kept.id.name.clone(),
                }),
                None => ops.push(FileOp::Copy {
                    from: kept.id.clone(),
                    to: FileId::new(root.clone(), kept.id.name.clone()),
                    size: kept.size,
                }),
            }
        }

        for op in ops {
            self.enqueue(op);
        }
    }

    fn delete_selected(&mut self) {
        let Some(selected) = self.selected_entry().cloned() else {
            return;
        };
        let in_copy = selected.meta.id.root != *self.archives.origin();
        if selected.kind == FileKind::Regular && selected.state == FileState::Absent && in_copy {
            self.enqueue(FileOp::Delete {
                id: selected.meta.id,
            });
        }
    }

    /// Send a mutation to the actor owning its destination root and log it
    /// as pending. An op identical to one still in flight is not reissued.
    fn enqueue(&mut self, op: FileOp) {
        if self.pending_ops.contains(&op) {
            return;
        }
        let Some(archive) = self.archives.get(op.executing_root()) else {
            warn!(?op, "mutation for unknown archive");
            return;
        };
        if let FileOp::Copy { size, .. } = &op {
            self.copy_total += size;
        }
        archive.send(op.command());
        self.pending_ops.push(op);
    }

    // --- Selection and navigation ---

    fn current_folder(&mut self) -> &mut FolderView {
        self.folders.entry(self.current_path.clone()).or_default()
    }

    fn selected_idx(&self) -> usize {
        self.folders
            .get(&self.current_path)
            .map(|f| f.selected_idx)
            .unwrap_or(0)
    }

    fn selected_entry(&self) -> Option<&ViewFile> {
        let folder = self.folders.get(&self.current_path)?;
        let id = folder.selected_id.as_ref()?;
        self.entries.iter().find(|e| e.id() == id)
    }

    fn set_selected_idx(&mut self, idx: isize) {
        let len = self.entries.len();
        if len == 0 {
            let folder = self.current_folder();
            folder.selected_id = None;
            folder.selected_idx = 0;
            return;
        }
        let idx = idx.clamp(0, len as isize - 1) as usize;
        let id = self.entries[idx].id().clone();
        let folder = self.current_folder();
        folder.selected_idx = idx;
        folder.selected_id = Some(id);
    }

    fn move_selection(&mut self, lines: i32) {
        let idx = self.selected_idx() as isize + lines as isize;
        self.set_selected_idx(idx);
        self.make_selected_visible();
    }

    fn select_first(&mut self) {
        if !self.entries.is_empty() {
            self.set_selected_idx(0);
            self.current_folder().offset_idx = 0;
        }
    }

    fn select_last(&mut self) {
        let len = self.entries.len();
        if len > 0 {
            self.set_selected_idx(len as isize - 1);
            self.make_selected_visible();
        }
    }

    /// Wheel scrolling moves the window and drags the selection along so
    /// it never leaves the visible pane.
    fn scroll(&mut self, lines: i32) {
        let len = self.entries.len();
        if len == 0 {
            return;
        }
        self.shift_offset(lines);
        let pane = self.pane_height();
        let offset = self.current_folder().offset_idx;
        let selected = self.selected_idx();
        if selected < offset {
            self.set_selected_idx(offset as isize);
        } else if selected >= offset + pane {
            self.set_selected_idx((offset + pane) as isize - 1);
        }
    }

    fn shift_offset(&mut self, lines: i32) {
        let len = self.entries.len();
        if len == 0 {
            return;
        }
        let folder = self.current_folder();
        folder.offset_idx =
            (folder.offset_idx as isize + lines as isize).clamp(0, len as isize - 1) as usize;
    }

    fn make_selected_visible(&mut self) {
        let pane = self.pane_height();
        let selected = self.selected_idx();
        let folder = self.current_folder();
        if folder.offset_idx > selected {
            folder.offset_idx = selected;
        }
        if selected + 1 > folder.offset_idx + pane {
            folder.offset_idx = selected + 1 - pane;
        }
    }

    fn pane_height(&self) -> usize {
        let gauges = self.archives.roots().len() as u16;
        self.screen_height
            .saturating_sub(CHROME_ROWS + gauges)
            .max(1) as usize
    }

    // --- Projection ---

    /// Rebuild the projection for the current folder, reconcile the stored
    /// selection with it, and assemble the frame snapshot.
    pub fn compose(&mut self) -> Screen {
        let pane = self.pane_height();
        let folder = self.folders.entry(self.current_path.clone()).or_default();

        let projection = projector::project(
            &self.archives,
            &self.current_path,
            folder.sort_column,
            folder.ascending(),
        );
        self.pending_files = projection.pending_files;
        self.duplicate_files = projection.duplicate_files;
        self.absent_files = projection.absent_files;
        self.origin_hashed = projection.origin_hashed;
        self.entries = projection.entries;

        let len = self.entries.len();
        if len == 0 {
            folder.selected_id = None;
            folder.selected_idx = 0;
            folder.offset_idx = 0;
        } else {
            let tracked = folder
                .selected_id
                .as_ref()
                .and_then(|id| self.entries.iter().position(|e| e.id() == id));
            match tracked {
                Some(pos) => folder.selected_idx = pos,
                None => {
                    folder.selected_idx = folder.selected_idx.min(len - 1);
                    folder.selected_id = Some(self.entries[folder.selected_idx].id().clone());
                }
            }
            folder.offset_idx = folder.offset_idx.min(len - 1);
            if folder.offset_idx > folder.selected_idx {
                folder.offset_idx = folder.selected_idx;
            }
            if folder.selected_idx + 1 > folder.offset_idx + pane {
                folder.offset_idx = folder.selected_idx + 1 - pane;
            }
        }

        let progress = self.progress_infos();
        let copy_progress = if self.copy_total > 0 {
            Some((self.copied_base + self.copying) as f64 / self.copy_total as f64)
        } else {
            None
        };
        let folder = &self.folders[&self.current_path];

        Screen {
            origin: self.archives.origin().clone(),
            current_path: self.current_path.clone(),
            entries: self.entries.clone(),
            selected_id: folder.selected_id.clone(),
            offset_idx: folder.offset_idx,
            sort_column: folder.sort_column,
            sort_ascending: folder.ascending(),
            pending_files: self.pending_files,
            duplicate_files: self.duplicate_files,
            absent_files: self.absent_files,
            progress,
            copy_progress,
            status_line: self.feedback.clone().or_else(|| self.errors.last().cloned()),
            width: self.screen_width,
            height: self.screen_height,
            pane_height: pane,
        }
    }

    fn progress_infos(&self) -> Vec<ProgressInfo> {
        self.archives
            .iter()
            .map(|(root, archive)| {
                let (label, value) = match archive.phase {
                    ScanPhase::Scanning => ("scanning", 0.0),
                    ScanPhase::Hashing => {
                        let value = if archive.total_size > 0 {
                            archive.total_hashed as f64 / archive.total_size as f64
                        } else {
                            1.0
                        };
                        ("hashing", value)
                    }
                    ScanPhase::Hashed => ("hashed", 1.0),
                };
                ProgressInfo {
                    root: root.clone(),
                    label,
                    value,
                }
            })
            .collect()
    }

    // --- External opening ---

    fn open_external(&mut self, target: &str) {
        #[cfg(target_os = "macos")]
        const OPENER: &str = "open";
        #[cfg(target_os = "windows")]
        const OPENER: &str = "explorer";
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        const OPENER: &str = "xdg-open";

        if let Err(err) = std::process::Command::new(OPENER).arg(target).spawn() {
            warn!(%target, %err, "failed to open externally");
            self.errors.push(format!("open {target}: {err}"));
        }
    }

    #[cfg(target_os = "macos")]
    fn reveal_selected(&mut self) {
        let Some(entry) = self.selected_entry().cloned() else {
            return;
        };
        let target = entry.meta.id.abs_string();
        if let Err(err) = std::process::Command::new("open").arg("-R").arg(&target).spawn() {
            warn!(%target, %err, "failed to reveal");
            self.errors.push(format!("reveal {target}: {err}"));
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn reveal_selected(&mut self) {
        let Some(entry) = self.selected_entry().cloned() else {
            return;
        };
        let id = &entry.meta.id;
        let dir = if id.path().is_root() {
            id.root.to_string()
        } else {
            format!("{}/{}", id.root, id.path())
        };
        self.open_external(&dir);
    }

    // --- Accessors (used by the binary and the test suite) ---

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn current_path(&self) -> &TreePath {
        &self.current_path
    }

    pub fn archives(&self) -> &Archives {
        &self.archives
    }

    pub fn hash_index(&self) -> &HashMap<Hash, HashSet<FileId>> {
        &self.by_hash
    }

    pub fn pending_ops(&self) -> &[FileOp] {
        &self.pending_ops
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

fn remove_from_index(index: &mut HashMap<Hash, HashSet<FileId>>, hash: &Hash, id: &FileId) {
    if let Some(ids) = index.get_mut(hash) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(hash);
        }
    }
}
