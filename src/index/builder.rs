//! Offset Index Builder - lazy, chunked extension of the offset index
//!
//! # Protocol
//!
//! ```text
//! ensure_chunk_built(target):
//!   loop
//!     table(target) present?           → Built            (no lock)
//!     file known to end before target? → PastEnd          (no lock)
//!     try_acquire()
//!       won  → scan from the frontier up to target, release, return
//!       lost → sleep(backoff), retry
//! ```
//!
//! The scan extends the lock after every chunk it persists. If the lock has
//! expired and passed to another builder, the scan stops and the caller goes
//! back to waiting.
//!
//! The holder resumes at the last record of the chunk before the frontier,
//! skips that record, and records where each following record begins. Each
//! chunk is written as soon as it is full and only then is the frontier moved
//! past it, so "frontier says built" always implies "table is readable". A
//! short (possibly empty) chunk marks the end of the file and stops the scan.
//!
//! A lost race only costs a backoff: every lock cycle moves the frontier
//! forward, so waiting callers make progress in file-length-bounded time.

use crate::index::{
    BuildCoordinator, BuildLock, ChunkId, ChunkLayout, ChunkLookup, IndexResult,
    OffsetIndexStore, OffsetTable,
};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

/// Upper bound on the offsets preallocated per chunk
const MAX_PREALLOC: u64 = 64 * 1024;

/// Builder tuning
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub layout: ChunkLayout,
    /// Wait between lock attempts
    pub backoff: Duration,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            layout: ChunkLayout::default(),
            backoff: Duration::from_secs(1),
        }
    }
}

/// Where a scan picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    /// Start filling `chunk` at byte `offset`; skip one record first when
    /// `offset` is the start of the previous chunk's last record
    At {
        chunk: ChunkId,
        offset: u64,
        skip_first: bool,
    },
    /// The file already ended in `last_chunk`
    End { last_chunk: ChunkId },
}

/// Extends the offset index of one file on demand
#[derive(Clone)]
pub struct OffsetIndexBuilder {
    path: PathBuf,
    index: OffsetIndexStore,
    coordinator: BuildCoordinator,
    config: BuilderConfig,
}

impl OffsetIndexBuilder {
    pub fn new(
        path: impl Into<PathBuf>,
        index: OffsetIndexStore,
        coordinator: BuildCoordinator,
        config: BuilderConfig,
    ) -> Self {
        Self {
            path: path.into(),
            index,
            coordinator,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> ChunkLayout {
        self.config.layout
    }

    pub fn index(&self) -> &OffsetIndexStore {
        &self.index
    }

    pub fn coordinator(&self) -> &BuildCoordinator {
        &self.coordinator
    }

    /// Table for `target`, building the index up to it if needed
    pub async fn ensure_chunk_built(&self, target: ChunkId) -> IndexResult<ChunkLookup> {
        let layout = self.config.layout;
        let mut waits = 0u64;

        loop {
            if let Some(table) = self.index.get_chunk_offsets(target).await? {
                return Ok(ChunkLookup::Built(table));
            }

            if let Some(last_chunk) = self.index.known_last_chunk(&layout).await? {
                if target > last_chunk {
                    return Ok(ChunkLookup::PastEnd { last_chunk });
                }
            }

            match self.coordinator.try_acquire(target).await? {
                Some(lock) => {
                    let result = self.build_through(target, &lock).await;
                    if let Err(e) = lock.release().await {
                        tracing::warn!(chunk = target, "Failed to release build lock: {}", e);
                    }

                    match result? {
                        Some(lookup) => return Ok(lookup),
                        None => {
                            tracing::warn!(chunk = target, "Build lock expired mid-scan, waiting");
                            tokio::time::sleep(self.config.backoff).await;
                        }
                    }
                }
                None => {
                    waits += 1;
                    tracing::debug!(
                        chunk = target,
                        waits,
                        "Another builder holds the index lock, backing off"
                    );
                    tokio::time::sleep(self.config.backoff).await;
                }
            }
        }
    }

    /// Runs with the build lock held. `None` means the lock was lost.
    async fn build_through(
        &self,
        target: ChunkId,
        lock: &BuildLock,
    ) -> IndexResult<Option<ChunkLookup>> {
        // Someone may have finished this chunk between our check and the lock
        if let Some(table) = self.index.get_chunk_offsets(target).await? {
            return Ok(Some(ChunkLookup::Built(table)));
        }

        let frontier = self.index.get_frontier().await?;

        match self.resume_point(frontier.min(target)).await? {
            Resume::End { last_chunk } => {
                self.index.set_frontier(last_chunk + 1).await?;
                Ok(Some(ChunkLookup::PastEnd { last_chunk }))
            }
            Resume::At {
                chunk,
                offset,
                skip_first,
            } => self.scan(chunk, offset, skip_first, target, lock).await,
        }
    }

    /// Find the resume point for chunk `from`, stepping back over chunks
    /// whose tables have gone missing from the store
    async fn resume_point(&self, from: ChunkId) -> IndexResult<Resume> {
        let layout = self.config.layout;
        let mut chunk = from;

        while chunk > 0 {
            let Some(prev) = self.index.get_chunk_offsets(chunk - 1).await? else {
                tracing::warn!(chunk = chunk - 1, "Offset table missing, rebuilding it");
                chunk -= 1;
                continue;
            };

            if !prev.is_complete(&layout) {
                return Ok(Resume::End {
                    last_chunk: chunk - 1,
                });
            }

            if let Some(offset) = prev.last_offset() {
                return Ok(Resume::At {
                    chunk,
                    offset,
                    skip_first: true,
                });
            }
        }

        Ok(Resume::At {
            chunk: 0,
            offset: 0,
            skip_first: false,
        })
    }

    /// One sequential pass from `offset`, persisting chunks `start..=target`
    async fn scan(
        &self,
        start: ChunkId,
        offset: u64,
        skip_first: bool,
        target: ChunkId,
        lock: &BuildLock,
    ) -> IndexResult<Option<ChunkLookup>> {
        let layout = self.config.layout;
        let chunk_size = layout.chunk_size();
        let started = Instant::now();

        let file = tokio::fs::File::open(&self.path).await?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset)).await?;

        let mut pos = offset;
        let mut buf = Vec::with_capacity(256);

        if skip_first {
            pos += reader.read_until(b'\n', &mut buf).await? as u64;
        }

        let mut chunk = start;
        let mut records = 0u64;

        let lookup = loop {
            let mut offsets = Vec::with_capacity(chunk_size.min(MAX_PREALLOC) as usize);
            let mut eof = false;

            while (offsets.len() as u64) < chunk_size {
                buf.clear();
                let n = reader.read_until(b'\n', &mut buf).await?;
                if n == 0 {
                    eof = true;
                    break;
                }
                offsets.push(pos);
                pos += n as u64;
            }

            records += offsets.len() as u64;
            let table = OffsetTable::new(chunk, offsets);

            // Table first, then the frontier
            self.index.put_chunk_offsets(&table).await?;
            self.index.set_frontier(chunk + 1).await?;

            tracing::debug!(chunk, records = table.len(), eof, "Chunk indexed");

            if chunk == target {
                break ChunkLookup::Built(table);
            }
            if eof {
                break ChunkLookup::PastEnd { last_chunk: chunk };
            }

            if !lock.extend().await? {
                tracing::warn!(
                    chunk,
                    holder = %lock.info().holder,
                    "Lost the build lock, stopping scan"
                );
                return Ok(None);
            }
            chunk += 1;
        };

        let first = layout.first_index(start);
        tracing::info!(
            "Indexed chunks {}..={} (records {}..{}, {} bytes) in {:?}",
            start,
            chunk,
            first,
            first + records,
            pos - offset,
            started.elapsed()
        );

        Ok(Some(lookup))
    }
}
