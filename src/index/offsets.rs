//! Offset Index Store - typed view of the index state in the cache store
//!
//! Holds, per chunk, the ordered byte offsets of its records, plus the build
//! frontier (the next chunk not yet built). Values are bincode encoded and
//! stored without expiry.

use crate::index::{ChunkId, ChunkLayout, IndexError, IndexResult, KeySpace, OffsetTable};
use crate::store::CacheStore;
use serde::Serialize;
use std::sync::Arc;

/// Snapshot of index progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Next chunk not yet built
    pub frontier: ChunkId,
    /// Final chunk of the file, once the scan has reached end of file
    pub last_chunk: Option<ChunkId>,
}

/// Chunk tables and frontier for one file
#[derive(Clone)]
pub struct OffsetIndexStore {
    store: Arc<dyn CacheStore>,
    keys: KeySpace,
}

impl OffsetIndexStore {
    pub fn new(store: Arc<dyn CacheStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Table for a chunk, if it has been built
    pub async fn get_chunk_offsets(&self, chunk: ChunkId) -> IndexResult<Option<OffsetTable>> {
        let Some(bytes) = self.store.get(&self.keys.offsets(chunk)).await? else {
            return Ok(None);
        };

        let table: OffsetTable = bincode::deserialize(&bytes)?;
        if table.chunk != chunk {
            return Err(IndexError::Corrupt(format!(
                "key for chunk {} holds table for chunk {}",
                chunk, table.chunk
            )));
        }
        Ok(Some(table))
    }

    /// Persist a complete table. Rewriting a chunk yields identical content.
    pub async fn put_chunk_offsets(&self, table: &OffsetTable) -> IndexResult<()> {
        let bytes = bincode::serialize(table)?;
        self.store
            .set(&self.keys.offsets(table.chunk), &bytes, None)
            .await?;
        Ok(())
    }

    /// Next chunk not yet built; 0 when nothing has been built
    pub async fn get_frontier(&self) -> IndexResult<ChunkId> {
        match self.store.get(&self.keys.frontier()).await? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(0),
        }
    }

    /// Move the frontier forward. Only the build lock holder calls this;
    /// a value at or behind the current frontier is ignored.
    pub async fn set_frontier(&self, frontier: ChunkId) -> IndexResult<ChunkId> {
        let current = self.get_frontier().await?;
        if frontier <= current {
            return Ok(current);
        }

        let bytes = bincode::serialize(&frontier)?;
        self.store.set(&self.keys.frontier(), &bytes, None).await?;
        Ok(frontier)
    }

    /// Final chunk of the file, if the frontier has already reached end of file
    pub async fn known_last_chunk(&self, layout: &ChunkLayout) -> IndexResult<Option<ChunkId>> {
        let frontier = self.get_frontier().await?;
        if frontier == 0 {
            return Ok(None);
        }

        let last = frontier - 1;
        Ok(self
            .get_chunk_offsets(last)
            .await?
            .filter(|table| !table.is_complete(layout))
            .map(|_| last))
    }

    pub async fn stats(&self, layout: &ChunkLayout) -> IndexResult<IndexStats> {
        Ok(IndexStats {
            frontier: self.get_frontier().await?,
            last_chunk: self.known_last_chunk(layout).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn create_test_store() -> OffsetIndexStore {
        OffsetIndexStore::new(Arc::new(MemoryStore::new()), KeySpace::new("test"))
    }

    #[tokio::test]
    async fn test_chunk_roundtrip() {
        let index = create_test_store();
        assert!(index.get_chunk_offsets(0).await.unwrap().is_none());

        let table = OffsetTable::new(0, vec![0, 2]);
        index.put_chunk_offsets(&table).await.unwrap();
        assert_eq!(index.get_chunk_offsets(0).await.unwrap(), Some(table));
        assert!(index.get_chunk_offsets(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frontier_defaults_to_zero_and_only_moves_forward() {
        let index = create_test_store();
        assert_eq!(index.get_frontier().await.unwrap(), 0);

        assert_eq!(index.set_frontier(3).await.unwrap(), 3);
        assert_eq!(index.set_frontier(1).await.unwrap(), 3);
        assert_eq!(index.get_frontier().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mismatched_chunk_is_corrupt() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let keys = KeySpace::new("test");
        let bytes = bincode::serialize(&OffsetTable::new(5, vec![1])).unwrap();
        store.set(&keys.offsets(0), &bytes, None).await.unwrap();

        let index = OffsetIndexStore::new(store, keys);
        assert!(matches!(
            index.get_chunk_offsets(0).await,
            Err(IndexError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_known_last_chunk() {
        let layout = ChunkLayout::new(2);
        let index = create_test_store();
        assert_eq!(index.known_last_chunk(&layout).await.unwrap(), None);

        index.put_chunk_offsets(&OffsetTable::new(0, vec![0, 2])).await.unwrap();
        index.set_frontier(1).await.unwrap();
        assert_eq!(index.known_last_chunk(&layout).await.unwrap(), None);

        index.put_chunk_offsets(&OffsetTable::new(1, vec![5])).await.unwrap();
        index.set_frontier(2).await.unwrap();
        assert_eq!(index.known_last_chunk(&layout).await.unwrap(), Some(1));

        let stats = index.stats(&layout).await.unwrap();
        assert_eq!(stats.frontier, 2);
        assert_eq!(stats.last_chunk, Some(1));
    }
}
