use std::time::{Duration, Instant};

use accord_core::{FileState, Root, TreePath};
use accord_engine::{event_bus, ArchiveScanner, Event, EventReceiver, Reconciler};
use accord_scanner::sim::SimFs;
use tokio::sync::mpsc::error::TryRecvError;

fn recv(rx: &mut EventReceiver) -> Event {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match rx.try_recv() {
            Ok(event) => return event,
            Err(TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "timed out waiting for event");
                std::thread::sleep(Duration::from_millis(2));
            }
            Err(TryRecvError::Disconnected) => panic!("event bus closed"),
        }
    }
}

fn reconcile_scripted(staged: bool) -> (Reconciler, EventReceiver) {
    let (tx, mut rx) = event_bus();
    let fs = SimFs::new(tx, staged);

    let mut scanners: Vec<(Root, Box<dyn ArchiveScanner>)> = Vec::new();
    for root in SimFs::roots() {
        let handle = fs.scanner(&root).unwrap();
        scanners.push((root, Box::new(handle)));
    }
    let mut recon = Reconciler::new(scanners);

    let mut hashed_roots = 0;
    while hashed_roots < SimFs::roots().len() {
        let event = recv(&mut rx);
        if matches!(event, Event::ArchiveHashed { .. }) {
            hashed_roots += 1;
        }
        recon.handle_event(event);
    }
    (recon, rx)
}

#[test]
fn scripted_archives_reconcile_to_the_expected_counters() {
    let (mut recon, _rx) = reconcile_scripted(false);

    let screen = recon.compose();
    assert_eq!(screen.pending_files, 0);
    // One duplicated hash within origin (photo.jpg twice).
    assert_eq!(screen.duplicate_files, 1);
    // Copy-only hashes: four in "copy 1", three in "copy 2".
    assert_eq!(screen.absent_files, 7);

    let duplicate_bases: Vec<&str> = screen
        .entries
        .iter()
        .filter(|e| e.state == FileState::Duplicate)
        .map(|e| e.id().base())
        .collect();
    assert!(duplicate_bases.contains(&"photo.jpg"));
    // The folder holding the second copy of the content is raised too.
    assert!(duplicate_bases.contains(&"a"));

    let absent_bases: Vec<&str> = screen
        .entries
        .iter()
        .filter(|e| e.state == FileState::Absent)
        .map(|e| e.id().base())
        .collect();
    assert!(absent_bases.contains(&"stray"));
    assert!(absent_bases.contains(&"x"));
    assert!(absent_bases.contains(&"clips"));
}

#[test]
fn staged_hashing_reaches_the_same_final_state() {
    let (mut fast, _rx1) = reconcile_scripted(false);
    let (mut staged, _rx2) = reconcile_scripted(true);

    let fast_screen = fast.compose();
    let staged_screen = staged.compose();
    assert_eq!(fast_screen.entries, staged_screen.entries);
    assert_eq!(fast_screen.duplicate_files, staged_screen.duplicate_files);
    assert_eq!(fast_screen.absent_files, staged_screen.absent_files);
}

#[test]
fn sim_mutations_follow_the_acknowledgment_protocol() {
    let (mut recon, mut rx) = reconcile_scripted(false);
    recon.compose();

    // Navigate to the duplicate and keep the top-level copy.
    recon.handle_event(Event::MouseTarget(accord_engine::MouseCommand::SelectFile(
        accord_core::FileId::new(
            Root::from("origin"),
            accord_core::Name::new(TreePath::root(), "photo.jpg"),
        ),
    )));
    recon.compose();
    recon.handle_event(Event::KeepOne);
    let expected_acks = recon.pending_ops().len();
    assert!(expected_acks > 0);

    let mut acked = 0;
    while acked < expected_acks {
        let event = recv(&mut rx);
        if matches!(event, Event::FilesHandled { .. }) {
            acked += 1;
        }
        recon.handle_event(event);
    }

    assert!(recon.pending_ops().is_empty());
    let screen = recon.compose();
    assert_eq!(screen.duplicate_files, 0);
}
