use std::cmp::Ordering;

use accord_core::{FileKind, SortColumn};

use crate::projector::ViewFile;

/// Total order over projection rows. Every column chains the remaining
/// keys in a fixed order and bottoms out at the row identity, so distinct
/// rows never compare equal and toggling the direction yields the exact
/// reverse sequence.
pub fn compare(a: &ViewFile, b: &ViewFile, column: SortColumn) -> Ordering {
    let ord = match column {
        SortColumn::Name => by_name(a, b)
            .then_with(|| by_state(a, b))
            .then_with(|| by_time(a, b))
            .then_with(|| by_size(a, b)),
        SortColumn::State => by_state(a, b)
            .then_with(|| by_name(a, b))
            .then_with(|| by_size(a, b))
            .then_with(|| by_time(a, b)),
        SortColumn::Time => by_time(a, b)
            .then_with(|| by_name(a, b))
            .then_with(|| by_state(a, b))
            .then_with(|| by_size(a, b)),
        SortColumn::Size => by_size(a, b)
            .then_with(|| by_name(a, b))
            .then_with(|| by_state(a, b))
            .then_with(|| by_time(a, b)),
    };
    ord.then_with(|| by_identity(a, b))
}

pub fn sort_entries(entries: &mut [ViewFile], column: SortColumn, ascending: bool) {
    entries.sort_by(|a, b| {
        let ord = compare(a, b, column);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

fn by_name(a: &ViewFile, b: &ViewFile) -> Ordering {
    a.meta
        .id
        .base()
        .to_lowercase()
        .cmp(&b.meta.id.base().to_lowercase())
}

fn by_state(a: &ViewFile, b: &ViewFile) -> Ordering {
    a.state.cmp(&b.state)
}

fn by_time(a: &ViewFile, b: &ViewFile) -> Ordering {
    a.meta.mod_time.cmp(&b.meta.mod_time)
}

fn by_size(a: &ViewFile, b: &ViewFile) -> Ordering {
    a.meta.size.cmp(&b.meta.size)
}

fn by_identity(a: &ViewFile, b: &ViewFile) -> Ordering {
    a.meta
        .id
        .cmp(&b.meta.id)
        .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
}

fn kind_rank(kind: FileKind) -> u8 {
    match kind {
        FileKind::Regular => 0,
        FileKind::Folder => 1,
    }
}
