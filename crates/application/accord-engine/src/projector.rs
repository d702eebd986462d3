use std::collections::{HashMap, HashSet};

use accord_core::{
    FileId, FileKind, FileMeta, FileState, Hash, Name, Root, SortColumn, TreePath,
};
use chrono::DateTime;

use crate::archive::Archives;
use crate::sorter;

/// One displayable row of the folder listing: either a regular file of
/// some archive or a synthetic folder row folded from deeper entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFile {
    pub meta: FileMeta,
    pub kind: FileKind,
    pub state: FileState,
}

impl ViewFile {
    pub fn id(&self) -> &FileId {
        &self.meta.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub entries: Vec<ViewFile>,
    pub pending_files: usize,
    pub duplicate_files: usize,
    pub absent_files: usize,
    pub origin_hashed: bool,
}

/// Project the archive state into the ordered listing for `current_path`
/// plus the aggregate counters. Pure: never mutates archive state, and
/// projecting the same state twice yields identical output.
pub fn project(
    archives: &Archives,
    current_path: &TreePath,
    column: SortColumn,
    ascending: bool,
) -> Projection {
    let mut projection = Projection::default();

    let census = origin_census(archives, &mut projection);
    origin_pass(archives, current_path, &census, &mut projection);
    if projection.origin_hashed {
        copy_overlay(archives, current_path, &census, &mut projection);
    }

    sorter::sort_entries(&mut projection.entries, column, ascending);
    projection
}

/// Count every origin hash and the still-pending files. `origin_hashed`
/// flips off as soon as one origin file lacks a hash; the copy overlay is
/// suppressed until the origin census is trustworthy.
fn origin_census(archives: &Archives, projection: &mut Projection) -> HashMap<Hash, usize> {
    let mut census: HashMap<Hash, usize> = HashMap::new();
    projection.origin_hashed = true;

    for meta in archives.origin_archive().files.values() {
        if meta.hash.is_empty() {
            projection.pending_files += 1;
            projection.origin_hashed = false;
        } else {
            *census.entry(meta.hash.clone()).or_insert(0) += 1;
        }
    }
    projection.duplicate_files = census.values().filter(|count| **count > 1).count();
    census
}

fn sorted_metas(files: &HashMap<Name, FileMeta>) -> Vec<&FileMeta> {
    let mut metas: Vec<&FileMeta> = files.values().collect();
    metas.sort_by(|a, b| a.id.name.cmp(&b.id.name));
    metas
}

fn origin_pass(
    archives: &Archives,
    current_path: &TreePath,
    census: &HashMap<Hash, usize>,
    projection: &mut Projection,
) {
    for meta in sorted_metas(&archives.origin_archive().files) {
        let duplicated = !meta.hash.is_empty() && census.get(&meta.hash).copied().unwrap_or(0) > 1;

        if meta.id.path() == current_path {
            let state = if meta.hash.is_empty() {
                FileState::Pending
            } else if duplicated {
                FileState::Duplicate
            } else {
                FileState::Resolved
            };
            projection.entries.push(ViewFile {
                meta: meta.clone(),
                kind: FileKind::Regular,
                state,
            });
        } else if current_path.is_strict_prefix_of(meta.id.path()) {
            let child = child_component(meta.id.path(), current_path);
            match folder_row_mut(&mut projection.entries, child) {
                Some(row) => {
                    row.meta.size += meta.size;
                    if row.meta.mod_time < meta.mod_time {
                        row.meta.mod_time = meta.mod_time;
                    }
                    if duplicated {
                        row.state.raise_to(FileState::Duplicate);
                    }
                }
                None => {
                    let state = if duplicated {
                        FileState::Duplicate
                    } else {
                        FileState::Resolved
                    };
                    projection.entries.push(ViewFile {
                        meta: FileMeta {
                            id: FileId::new(
                                meta.id.root.clone(),
                                Name::new(current_path.clone(), child),
                            ),
                            size: meta.size,
                            mod_time: meta.mod_time,
                            hash: Hash::default(),
                        },
                        kind: FileKind::Folder,
                        state,
                    });
                }
            }
        }
    }
}

/// Overlay the copy-only content: every non-empty hash that origin does
/// not hold shows up as an Absent row. Distinct hashes are counted once;
/// a hash already represented by a prior copy under the same name is not
/// re-emitted.
fn copy_overlay(
    archives: &Archives,
    current_path: &TreePath,
    census: &HashMap<Hash, usize>,
    projection: &mut Projection,
) {
    let mut absent_hashes: HashSet<Hash> = HashSet::new();
    let mut represented: HashSet<(Hash, Name)> = HashSet::new();

    for root in archives.copies() {
        let Some(archive) = archives.get(root) else {
            continue;
        };
        for meta in sorted_metas(&archive.files) {
            if meta.hash.is_empty() || census.contains_key(&meta.hash) {
                continue;
            }
            if absent_hashes.insert(meta.hash.clone()) {
                projection.absent_files += 1;
            }
            if represented.contains(&(meta.hash.clone(), meta.id.name.clone())) {
                continue;
            }

            if meta.id.path() == current_path {
                represented.insert((meta.hash.clone(), meta.id.name.clone()));
                projection.entries.push(ViewFile {
                    meta: meta.clone(),
                    kind: FileKind::Regular,
                    state: FileState::Absent,
                });
            } else if current_path.is_strict_prefix_of(meta.id.path()) {
                let child = child_component(meta.id.path(), current_path);
                if folder_row(&projection.entries, child).is_some() {
                    continue;
                }
                projection.entries.push(ViewFile {
                    meta: FileMeta {
                        id: FileId::new(root.clone(), Name::new(current_path.clone(), child)),
                        size: 0,
                        mod_time: DateTime::UNIX_EPOCH,
                        hash: Hash::default(),
                    },
                    kind: FileKind::Folder,
                    state: FileState::Absent,
                });
            }
        }
    }
}

fn child_component<'a>(path: &'a TreePath, current: &TreePath) -> &'a str {
    let rest = path.strip_prefix(current).unwrap_or("");
    rest.split('/').next().unwrap_or(rest)
}

fn folder_row_mut<'a>(entries: &'a mut [ViewFile], base: &str) -> Option<&'a mut ViewFile> {
    entries
        .iter_mut()
        .find(|e| e.kind == FileKind::Folder && e.meta.id.base() == base)
}

fn folder_row<'a>(entries: &'a [ViewFile], base: &str) -> Option<&'a ViewFile> {
    entries
        .iter()
        .find(|e| e.kind == FileKind::Folder && e.meta.id.base() == base)
}

/// Aggregate gauges shown per archive while scanning and hashing.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub root: Root,
    pub label: &'static str,
    pub value: f64,
}
