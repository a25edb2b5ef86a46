//! Lineseek Offset Index
//!
//! A byte-offset index over a newline-delimited file, built lazily in
//! fixed-size chunks and shared through the cache store:
//!
//! - **OffsetIndexStore**: typed access to chunk tables and the build frontier
//! - **BuildCoordinator**: one global build lock with crash-safe expiry
//! - **OffsetIndexBuilder**: extends the index with one sequential scan
//!
//! # Layout
//!
//! ```text
//! records:  0 1 2 | 3 4 5 | 6 7 8 | 9 10        (chunk_size = 3)
//! chunks:   c0    | c1    | c2    | c3 (short → end of file)
//!
//! <ns>:offsets:0  → [0, 12, 30]
//! <ns>:offsets:1  → [41, 50, 77]
//! <ns>:frontier   → 2        (c0 and c1 built, c2 is next)
//! <ns>:build_lock → LockInfo (present only while someone scans)
//! ```
//!
//! Readers never lock: a present table is complete and immutable.

mod builder;
mod coordinator;
mod error;
mod offsets;

pub use builder::{BuilderConfig, OffsetIndexBuilder};
pub use coordinator::{BuildCoordinator, BuildLock, LockInfo};
pub use error::{IndexError, IndexResult};
pub use offsets::{IndexStats, OffsetIndexStore};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Index of a chunk in the record-index space
pub type ChunkId = u64;

/// 0-based position of a record in the file
pub type RecordIndex = u64;

/// Chunk geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: u64,
}

impl ChunkLayout {
    /// `chunk_size` must be non-zero; a zero is treated as one
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunk owning a record
    pub fn chunk_of(&self, index: RecordIndex) -> ChunkId {
        index / self.chunk_size
    }

    /// Position of a record inside its chunk
    pub fn slot_of(&self, index: RecordIndex) -> usize {
        (index % self.chunk_size) as usize
    }

    /// First record covered by a chunk
    pub fn first_index(&self, chunk: ChunkId) -> RecordIndex {
        chunk.saturating_mul(self.chunk_size)
    }
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Byte offsets of the records in one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTable {
    pub chunk: ChunkId,
    /// Entry `i` is where record `chunk * chunk_size + i` begins
    pub offsets: Vec<u64>,
}

impl OffsetTable {
    pub fn new(chunk: ChunkId, offsets: Vec<u64>) -> Self {
        Self { chunk, offsets }
    }

    pub fn get(&self, slot: usize) -> Option<u64> {
        self.offsets.get(slot).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// A short table is the last one in the file
    pub fn is_complete(&self, layout: &ChunkLayout) -> bool {
        self.offsets.len() as u64 >= layout.chunk_size()
    }

    /// Start of the final record in this chunk
    pub fn last_offset(&self) -> Option<u64> {
        self.offsets.last().copied()
    }
}

/// What the builder found for a requested chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkLookup {
    /// The chunk exists (it may be the short final chunk)
    Built(OffsetTable),
    /// The file ends before this chunk; `last_chunk` is the final chunk that exists
    PastEnd { last_chunk: ChunkId },
}

impl ChunkLookup {
    pub fn table(&self) -> Option<&OffsetTable> {
        match self {
            ChunkLookup::Built(table) => Some(table),
            ChunkLookup::PastEnd { .. } => None,
        }
    }
}

/// Key namespace for one backing file and chunk size
///
/// Derived from the canonical path so several files can share one store.
/// Tables are only meaningful under the layout that built them, so the
/// chunk size is part of the namespace too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Namespace for a file: `lineseek:<file name>:<crc32 of canonical path>:c<chunk size>`
    pub fn for_file(path: &Path, layout: &ChunkLayout) -> Self {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let full = canonical.to_string_lossy();
        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        Self::new(format!(
            "lineseek:{}:{:08x}:c{}",
            name,
            crc32fast::hash(full.as_bytes()),
            layout.chunk_size()
        ))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn offsets(&self, chunk: ChunkId) -> String {
        format!("{}:offsets:{}", self.prefix, chunk)
    }

    pub fn frontier(&self) -> String {
        format!("{}:frontier", self.prefix)
    }

    pub fn build_lock(&self) -> String {
        format!("{}:build_lock", self.prefix)
    }

    pub fn line(&self, index: RecordIndex) -> String {
        format!("{}:line:{}", self.prefix, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout() {
        let layout = ChunkLayout::new(2);
        assert_eq!(layout.chunk_of(0), 0);
        assert_eq!(layout.chunk_of(1), 0);
        assert_eq!(layout.chunk_of(3), 1);
        assert_eq!(layout.slot_of(3), 1);
        assert_eq!(layout.first_index(5), 10);

        // Pre-warm probes use the largest index
        assert_eq!(ChunkLayout::new(1000).chunk_of(i64::MAX as u64), 9_223_372_036_854_775);
        assert_eq!(ChunkLayout::new(0).chunk_size(), 1);
    }

    #[test]
    fn test_offset_table() {
        let layout = ChunkLayout::new(2);
        let full = OffsetTable::new(0, vec![0, 2]);
        assert!(full.is_complete(&layout));
        assert_eq!(full.last_offset(), Some(2));
        assert_eq!(full.get(1), Some(2));
        assert_eq!(full.get(2), None);

        let short = OffsetTable::new(1, vec![5]);
        assert!(!short.is_complete(&layout));

        let empty = OffsetTable::new(2, vec![]);
        assert!(empty.is_empty());
        assert!(empty.last_offset().is_none());
    }

    #[test]
    fn test_keyspace_keys() {
        let keys = KeySpace::new("ns");
        assert_eq!(keys.offsets(3), "ns:offsets:3");
        assert_eq!(keys.frontier(), "ns:frontier");
        assert_eq!(keys.build_lock(), "ns:build_lock");
        assert_eq!(keys.line(7), "ns:line:7");
    }

    #[test]
    fn test_keyspace_distinct_per_file() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("sub").join("a.txt");
        std::fs::write(&a, "x\n").unwrap();

        let layout = ChunkLayout::new(100);
        let ka = KeySpace::for_file(&a, &layout);
        let kb = KeySpace::for_file(&b, &layout);
        assert_ne!(ka, kb);
        assert!(ka.prefix().starts_with("lineseek:a.txt:"));
        assert!(ka.prefix().ends_with(":c100"));

        // Same file, same namespace
        assert_eq!(ka, KeySpace::for_file(&a, &layout));
    }

    #[test]
    fn test_keyspace_distinct_per_chunk_size() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        std::fs::write(&a, "x\n").unwrap();

        let small = KeySpace::for_file(&a, &ChunkLayout::new(2));
        let large = KeySpace::for_file(&a, &ChunkLayout::new(3));
        assert_ne!(small, large);
        assert_ne!(small.offsets(0), large.offsets(0));
        assert_ne!(small.frontier(), large.frontier());
    }
}
