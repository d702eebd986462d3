use std::collections::HashMap;

use accord_core::{FileMeta, Name, Root, ScanPhase};

use crate::commands::FileCommand;
use crate::ports::ArchiveScanner;

/// Per-root record: the scanner handle, the flat file index, and hashing
/// progress. Every `FileMeta` stored here has `id.root` equal to the
/// archive's root.
pub struct Archive {
    scanner: Box<dyn ArchiveScanner>,
    pub files: HashMap<Name, FileMeta>,
    pub phase: ScanPhase,
    pub total_size: u64,
    pub total_hashed: u64,
}

impl Archive {
    pub fn new(scanner: Box<dyn ArchiveScanner>) -> Self {
        Self {
            scanner,
            files: HashMap::new(),
            phase: ScanPhase::Scanning,
            total_size: 0,
            total_hashed: 0,
        }
    }

    pub fn send(&self, cmd: FileCommand) {
        self.scanner.send(cmd);
    }
}

/// All archives of the run, in declared order. The first root is origin,
/// the rest are copies.
pub struct Archives {
    roots: Vec<Root>,
    map: HashMap<Root, Archive>,
}

impl Archives {
    pub fn new(scanners: Vec<(Root, Box<dyn ArchiveScanner>)>) -> Self {
        let roots: Vec<Root> = scanners.iter().map(|(root, _)| root.clone()).collect();
        let map = scanners
            .into_iter()
            .map(|(root, scanner)| (root, Archive::new(scanner)))
            .collect();
        Self { roots, map }
    }

    pub fn origin(&self) -> &Root {
        &self.roots[0]
    }

    pub fn copies(&self) -> &[Root] {
        &self.roots[1..]
    }

    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    pub fn get(&self, root: &Root) -> Option<&Archive> {
        self.map.get(root)
    }

    pub fn get_mut(&mut self, root: &Root) -> Option<&mut Archive> {
        self.map.get_mut(root)
    }

    pub fn origin_archive(&self) -> &Archive {
        &self.map[&self.roots[0]]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Root, &Archive)> + '_ {
        self.roots.iter().map(move |r| (r, &self.map[r]))
    }
}
