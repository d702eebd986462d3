mod common;

use accord_core::{FileState, Root};
use accord_engine::{Event, FileCommand};
use common::*;

#[test]
fn pure_origin_without_duplicates_is_fully_resolved() {
    let (mut recon, logs) = reconciler(&["origin"]);
    scan_and_hash(
        &mut recon,
        "origin",
        &[("a.txt", "H1", 10, 1000), ("b.txt", "H2", 20, 2000)],
    );

    let screen = recon.compose();
    assert_eq!(bases(&screen), vec!["a.txt", "b.txt"]);
    assert!(screen
        .entries
        .iter()
        .all(|e| e.state == FileState::Resolved));
    assert_eq!(screen.pending_files, 0);
    assert_eq!(screen.duplicate_files, 0);
    assert_eq!(screen.absent_files, 0);

    // The scan triggered the hash command for the root.
    let commands = logs[&Root::from("origin")].lock().unwrap();
    assert_eq!(
        *commands,
        vec![FileCommand::ScanArchive, FileCommand::HashArchive]
    );
}

#[test]
fn shared_hash_within_origin_marks_both_rows_duplicate() {
    let (mut recon, _) = reconciler(&["origin"]);
    scan_and_hash(
        &mut recon,
        "origin",
        &[("x.txt", "H1", 10, 1000), ("y.txt", "H1", 10, 2000)],
    );

    let screen = recon.compose();
    assert_eq!(screen.duplicate_files, 1);
    assert_eq!(screen.entries.len(), 2);
    assert!(screen
        .entries
        .iter()
        .all(|e| e.state == FileState::Duplicate));
}

#[test]
fn copy_content_present_in_origin_is_not_absent() {
    let (mut recon, _) = reconciler(&["origin", "copy"]);
    scan_and_hash(&mut recon, "origin", &[("z.txt", "H9", 10, 1000)]);
    scan_and_hash(&mut recon, "copy", &[("z.txt", "H9", 10, 1000)]);

    let screen = recon.compose();
    assert_eq!(bases(&screen), vec!["z.txt"]);
    assert_eq!(find(&screen, "z.txt").unwrap().state, FileState::Resolved);
    assert_eq!(screen.absent_files, 0);
}

#[test]
fn copy_only_content_overlays_as_absent() {
    let (mut recon, _) = reconciler(&["origin", "copy"]);
    scan_and_hash(&mut recon, "origin", &[]);
    scan_and_hash(&mut recon, "copy", &[("w", "H9", 10, 1000)]);

    let screen = recon.compose();
    assert_eq!(bases(&screen), vec!["w"]);
    assert_eq!(find(&screen, "w").unwrap().state, FileState::Absent);
    assert_eq!(screen.absent_files, 1);
}

#[test]
fn overlay_is_suppressed_until_origin_is_fully_hashed() {
    let (mut recon, _) = reconciler(&["origin", "copy"]);
    scan(
        &mut recon,
        "origin",
        vec![meta("origin", "a.txt", 10, 1000)],
    );
    scan_and_hash(&mut recon, "copy", &[("w", "H9", 10, 1000)]);

    // Origin still has a pending file; the copy overlay must not run.
    let screen = recon.compose();
    assert_eq!(bases(&screen), vec!["a.txt"]);
    assert_eq!(screen.pending_files, 1);
    assert_eq!(screen.absent_files, 0);

    hash(&mut recon, "origin", "a.txt", "H1");
    finish_hash(&mut recon, "origin");
    let screen = recon.compose();
    assert_eq!(bases(&screen), vec!["a.txt", "w"]);
    assert_eq!(screen.pending_files, 0);
    assert_eq!(screen.absent_files, 1);
}

#[test]
fn absent_hashes_count_once_across_copies_and_names() {
    let (mut recon, _) = reconciler(&["origin", "copy 1", "copy 2"]);
    scan_and_hash(&mut recon, "origin", &[("keep.txt", "H1", 10, 1000)]);
    scan_and_hash(
        &mut recon,
        "copy 1",
        &[("stray.txt", "H7", 10, 1000), ("other.txt", "H8", 10, 1000)],
    );
    // Same content twice more in copy 2: once under the same name (not
    // re-emitted), once under a different name (shown again).
    scan_and_hash(
        &mut recon,
        "copy 2",
        &[
            ("stray.txt", "H7", 10, 1000),
            ("renamed.txt", "H7", 10, 1000),
        ],
    );

    let screen = recon.compose();
    assert_eq!(screen.absent_files, 2);
    let mut names = bases(&screen);
    names.sort();
    assert_eq!(names, vec!["keep.txt", "other.txt", "renamed.txt", "stray.txt"]);
}

#[test]
fn nested_origin_files_fold_into_one_folder_row() {
    let (mut recon, _) = reconciler(&["origin"]);
    scan_and_hash(
        &mut recon,
        "origin",
        &[
            ("a/b/c.txt", "H1", 100, 1000),
            ("a/b/d.txt", "H2", 50, 3000),
            ("a/e.txt", "H3", 7, 2000),
        ],
    );

    let screen = recon.compose();
    assert_eq!(bases(&screen), vec!["a"]);
    let folder = find(&screen, "a").unwrap();
    assert_eq!(folder.meta.size, 157);
    assert_eq!(folder.meta.mod_time, ts(3000));
}

#[test]
fn folder_row_raises_duplicate_from_contained_files() {
    let (mut recon, _) = reconciler(&["origin"]);
    scan_and_hash(
        &mut recon,
        "origin",
        &[
            ("top.txt", "H1", 10, 1000),
            ("nested/inner.txt", "H1", 10, 1000),
            ("clean/leaf.txt", "H2", 10, 1000),
        ],
    );

    let screen = recon.compose();
    assert_eq!(find(&screen, "nested").unwrap().state, FileState::Duplicate);
    assert_eq!(find(&screen, "clean").unwrap().state, FileState::Resolved);
    assert_eq!(find(&screen, "top.txt").unwrap().state, FileState::Duplicate);
}

#[test]
fn projection_is_idempotent() {
    let (mut recon, _) = reconciler(&["origin", "copy"]);
    scan_and_hash(
        &mut recon,
        "origin",
        &[("a/b/c.txt", "H1", 10, 1000), ("a/d.txt", "H1", 10, 2000)],
    );
    scan_and_hash(&mut recon, "copy", &[("x/y.txt", "H5", 10, 1000)]);

    let first = recon.compose();
    let second = recon.compose();
    assert_eq!(first.entries, second.entries);
    assert_eq!(first.pending_files, second.pending_files);
    assert_eq!(first.duplicate_files, second.duplicate_files);
    assert_eq!(first.absent_files, second.absent_files);
}

#[test]
fn scanner_errors_are_logged_and_surfaced() {
    let (mut recon, _) = reconciler(&["origin"]);
    recon.handle_event(Event::Error {
        root: Some(Root::from("origin")),
        op: None,
        message: "permission denied: secret.txt".to_string(),
    });

    assert_eq!(recon.errors().len(), 1);
    let screen = recon.compose();
    assert!(screen
        .status_line
        .as_deref()
        .unwrap()
        .contains("permission denied"));
}
