use std::fs;
use std::time::{Duration, Instant};

use accord_core::{FileId, Name, Root, TreePath};
use accord_engine::{event_bus, ArchiveScanner, Event, EventReceiver, FileCommand};
use accord_scanner::spawn_scanner;
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

fn file_id(root: &Root, full: &str) -> FileId {
    let name = match full.rsplit_once('/') {
        Some((dir, base)) => Name::new(TreePath::new(dir), base),
        None => Name::new(TreePath::root(), full),
    };
    FileId::new(root.clone(), name)
}

#[test]
fn scan_then_hash_follows_the_protocol() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("alpha.txt"), b"hello").unwrap();
    fs::create_dir_all(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested/beta.txt"), b"hello").unwrap();
    fs::write(dir.path().join("gamma.bin"), b"different").unwrap();

    let root = Root::new(dir.path().to_str().unwrap());
    let (tx, mut rx) = event_bus();
    let scanner = spawn_scanner(root.clone(), tx).unwrap();

    scanner.send(FileCommand::ScanArchive);
    let Event::ArchiveScanned { root: scanned, metas } = recv(&mut rx) else {
        panic!("expected scan result first");
    };
    assert_eq!(scanned, root);
    assert_eq!(metas.len(), 3);
    let mut names: Vec<String> = metas.iter().map(|m| m.id.name.full_name()).collect();
    names.sort();
    assert_eq!(names, vec!["alpha.txt", "gamma.bin", "nested/beta.txt"]);
    assert!(metas.iter().all(|m| m.hash.is_empty()));
    let alpha = metas
        .iter()
        .find(|m| m.id.base() == "alpha.txt")
        .unwrap();
    assert_eq!(alpha.size, 5);

    scanner.send(FileCommand::HashArchive);
    let mut hashes = Vec::new();
    let mut progress = Vec::new();
    loop {
        match recv(&mut rx) {
            Event::FileHashed { id, hash } => hashes.push((id.name.full_name(), hash)),
            Event::HashingProgress { hashed, .. } => progress.push(hashed),
            Event::ArchiveHashed { root: done } => {
                assert_eq!(done, root);
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(hashes.len(), 3);
    let by_name: std::collections::HashMap<_, _> = hashes.into_iter().collect();
    // MD5("hello"), shared by the two identical files.
    assert_eq!(
        by_name["alpha.txt"].as_str(),
        "5D41402ABC4B2A76B9719D911017C592"
    );
    assert_eq!(by_name["alpha.txt"], by_name["nested/beta.txt"]);
    assert_ne!(by_name["alpha.txt"], by_name["gamma.bin"]);

    // Progress is monotonic and ends at the full byte count.
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(5 + 5 + 9));
}

#[test]
fn repeated_scan_commands_produce_one_scan_result() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("only.txt"), b"x").unwrap();

    let root = Root::new(dir.path().to_str().unwrap());
    let (tx, mut rx) = event_bus();
    let scanner = spawn_scanner(root.clone(), tx).unwrap();

    scanner.send(FileCommand::ScanArchive);
    scanner.send(FileCommand::ScanArchive);
    scanner.send(FileCommand::HashArchive);

    assert!(matches!(recv(&mut rx), Event::ArchiveScanned { .. }));
    // The repeated scan is ignored; the next events belong to hashing.
    loop {
        match recv(&mut rx) {
            Event::ArchiveScanned { .. } => panic!("second scan result emitted"),
            Event::ArchiveHashed { .. } => break,
            Event::FileHashed { .. } | Event::HashingProgress { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[test]
fn hash_pass_works_from_the_live_tree_and_always_terminates() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fine.txt"), b"ok").unwrap();

    let root = Root::new(dir.path().to_str().unwrap());
    let (tx, mut rx) = event_bus();
    let scanner = spawn_scanner(root.clone(), tx).unwrap();

    scanner.send(FileCommand::ScanArchive);
    assert!(matches!(recv(&mut rx), Event::ArchiveScanned { .. }));

    // Remove the file between scan and hash: the hash pass re-walks, so
    // the archive still terminates with ArchiveHashed.
    fs::remove_file(dir.path().join("fine.txt")).unwrap();
    scanner.send(FileCommand::HashArchive);
    loop {
        match recv(&mut rx) {
            Event::ArchiveHashed { root: done } => {
                assert_eq!(done, root);
                break;
            }
            Event::FileHashed { .. } | Event::HashingProgress { .. } | Event::Error { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // The worker is still alive and answers further commands.
    scanner.send(FileCommand::DeleteFile {
        id: file_id(&root, "fine.txt"),
    });
    assert!(matches!(recv(&mut rx), Event::FilesHandled { .. }));
}
