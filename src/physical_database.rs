//! Owns one [`Disk`] per [`FileKind`] and the cumulative read/write counters
//! used for observability: one record file and one header/bitmap companion
//! file for nodes, and the same pair for relationships.

use std::path::Path;

use crate::disk::{Disk, FileSystem, Memory};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    NodeRecords,
    NodeHeader,
    RelationshipRecords,
    RelationshipHeader,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::NodeRecords,
        FileKind::NodeHeader,
        FileKind::RelationshipRecords,
        FileKind::RelationshipHeader,
    ];

    fn suffix(self) -> &'static str {
        match self {
            FileKind::NodeRecords => "nodes",
            FileKind::NodeHeader => "nodes_hdr",
            FileKind::RelationshipRecords => "rels",
            FileKind::RelationshipHeader => "rels_hdr",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileCounters {
    pub reads: u64,
    pub writes: u64,
}

/// Owns the four on-disk files that make up one database, exclusively.
pub struct PhysicalDatabase<D: Disk = FileSystem> {
    files: [D; 4],
    counters: [FileCounters; 4],
}

fn index_of(kind: FileKind) -> usize {
    match kind {
        FileKind::NodeRecords => 0,
        FileKind::NodeHeader => 1,
        FileKind::RelationshipRecords => 2,
        FileKind::RelationshipHeader => 3,
    }
}

impl PhysicalDatabase<FileSystem> {
    /// Opens or creates the four files for a database rooted at `prefix`
    /// (e.g. `prefix.nodes`, `prefix.nodes_hdr`, ...).
    pub fn create(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let files = FileKind::ALL.map(|kind| {
            let mut path = prefix.as_os_str().to_owned();
            path.push(".");
            path.push(kind.suffix());
            FileSystem::create(path)
        });

        let [a, b, c, d] = files;
        Ok(Self {
            files: [a?, b?, c?, d?],
            counters: Default::default(),
        })
    }
}

impl PhysicalDatabase<Memory> {
    /// An all-in-memory database for tests.
    pub fn create_in_memory() -> Self {
        Self {
            files: std::array::from_fn(|_| Memory::new()),
            counters: Default::default(),
        }
    }
}

impl<D: Disk> PhysicalDatabase<D> {
    pub fn file(&self, kind: FileKind) -> &D {
        &self.files[index_of(kind)]
    }

    pub fn file_mut(&mut self, kind: FileKind) -> &mut D {
        &mut self.files[index_of(kind)]
    }

    pub fn counters(&self, kind: FileKind) -> FileCounters {
        self.counters[index_of(kind)]
    }

    pub fn record_read(&mut self, kind: FileKind) {
        self.counters[index_of(kind)].reads += 1;
    }

    pub fn record_write(&mut self, kind: FileKind) {
        self.counters[index_of(kind)].writes += 1;
    }

    /// Flushes nothing by itself (the [`crate::page_cache::PageCache`] owns
    /// dirty pages); closing just means dropping the files, since this type
    /// has no in-flight state of its own to flush.
    pub fn close(self) {}
}
