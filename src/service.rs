//! Line Service - public entry point
//!
//! ```text
//! fetch_record(i)
//!   i < 0                 → InvalidIndex
//!   content cache hit     → bytes
//!   builder(chunk_of(i))  → PastEnd               → None
//!   table[slot_of(i)]     → missing (short chunk) → None
//!   reader(offset)        → EOF                   → None
//!   cache bytes, return
//! ```

use crate::cache::{CacheStats, ContentCache};
use crate::config::Config;
use crate::error::{LineError, LineResult};
use crate::index::{
    BuildCoordinator, BuilderConfig, ChunkLayout, ChunkLookup, IndexStats, KeySpace,
    OffsetIndexBuilder, OffsetIndexStore,
};
use crate::reader::FileReader;
use crate::store::{open_store, CacheStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Service-wide statistics
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub file: PathBuf,
    pub store: &'static str,
    pub chunk_size: u64,
    pub index: IndexStats,
    pub cache: CacheStats,
}

/// Random access to the records of one file
pub struct LineService {
    builder: OffsetIndexBuilder,
    reader: FileReader,
    cache: ContentCache,
}

impl LineService {
    pub fn new(builder: OffsetIndexBuilder, reader: FileReader, cache: ContentCache) -> Self {
        Self {
            builder,
            reader,
            cache,
        }
    }

    /// Wire up the store, index and caches described by `config`
    pub async fn open(config: &Config) -> LineResult<Self> {
        let store = open_store(&config.store)?;
        Self::with_store(config, store).await
    }

    /// Same as `open`, over an existing store
    pub async fn with_store(config: &Config, store: Arc<dyn CacheStore>) -> LineResult<Self> {
        let reader = FileReader::open(&config.file.path).await?;
        let layout = ChunkLayout::new(config.index.chunk_size);
        let keys = KeySpace::for_file(reader.path(), &layout);

        tracing::info!(
            "Serving {:?} (namespace {}, chunk size {})",
            reader.path(),
            keys.prefix(),
            layout.chunk_size()
        );

        let index = OffsetIndexStore::new(Arc::clone(&store), keys.clone());
        let coordinator =
            BuildCoordinator::new(Arc::clone(&store), &keys, config.index.lock_ttl());
        let builder = OffsetIndexBuilder::new(
            reader.path(),
            index,
            coordinator,
            BuilderConfig {
                layout,
                backoff: config.index.backoff(),
            },
        );

        let cache = ContentCache::new(
            store,
            keys,
            config.cache.local_capacity,
            config.cache.content_ttl(),
        );

        Ok(Self::new(builder, reader, cache))
    }

    /// Bytes of record `index` (0-based), or `None` past the end of the file
    pub async fn fetch_record(&self, index: i64) -> LineResult<Option<Vec<u8>>> {
        if index < 0 {
            return Err(LineError::InvalidIndex(index));
        }
        let index = index as u64;

        if let Some(record) = self.cache.get(index).await? {
            return Ok(Some(record));
        }

        tracing::debug!("Cache miss for record {}", index);

        let layout = self.builder.layout();
        let table = match self.builder.ensure_chunk_built(layout.chunk_of(index)).await? {
            ChunkLookup::Built(table) => table,
            ChunkLookup::PastEnd { .. } => return Ok(None),
        };

        let Some(offset) = table.get(layout.slot_of(index)) else {
            return Ok(None);
        };

        let Some(record) = self.reader.read_record_at(offset).await? else {
            tracing::debug!(index, offset, "Indexed offset is at end of file");
            return Ok(None);
        };

        if let Err(e) = self.cache.put(index, &record).await {
            tracing::warn!("Failed to cache record {}: {}", index, e);
        }

        Ok(Some(record))
    }

    /// `fetch_record` decoded as text; invalid UTF-8 is replaced
    pub async fn fetch_line(&self, index: i64) -> LineResult<Option<String>> {
        Ok(self
            .fetch_record(index)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        self.builder.index().cache_store()
    }

    pub fn builder(&self) -> &OffsetIndexBuilder {
        &self.builder
    }

    pub async fn stats(&self) -> LineResult<ServiceStats> {
        let layout = self.builder.layout();
        Ok(ServiceStats {
            file: self.reader.path().to_path_buf(),
            store: self.store().name(),
            chunk_size: layout.chunk_size(),
            index: self.builder.index().stats(&layout).await?,
            cache: self.cache.stats().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreKind;
    use crate::store::testing::UnreachableStore;
    use crate::store::{MemoryStore, SqliteStore};
    use futures_util::future::join_all;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn test_config(path: &Path, chunk_size: u64) -> Config {
        let mut config = Config::default();
        config.file.path = path.to_path_buf();
        config.index.chunk_size = chunk_size;
        config.index.backoff_ms = 5;
        config.store.kind = StoreKind::Memory;
        config
    }

    async fn create_test_service(content: &str, chunk_size: u64) -> (LineService, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, content).unwrap();

        let service = LineService::open(&test_config(&path, chunk_size))
            .await
            .unwrap();
        (service, dir)
    }

    #[tokio::test]
    async fn test_three_records() {
        let (service, _dir) = create_test_service("a\nbb\nccc\n", 2).await;

        assert_eq!(service.fetch_record(1).await.unwrap().unwrap(), b"bb");
        assert_eq!(service.fetch_record(0).await.unwrap().unwrap(), b"a");
        assert_eq!(service.fetch_record(2).await.unwrap().unwrap(), b"ccc");
        assert!(service.fetch_record(3).await.unwrap().is_none());
        assert!(service.fetch_record(1_000_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_index_touches_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "a\n").unwrap();

        let service = LineService::with_store(&test_config(&path, 2), Arc::new(UnreachableStore))
            .await
            .unwrap();

        assert!(matches!(
            service.fetch_record(-5).await,
            Err(LineError::InvalidIndex(-5))
        ));
    }

    #[tokio::test]
    async fn test_store_outage_is_transient_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "a\n").unwrap();

        let service = LineService::with_store(&test_config(&path, 2), Arc::new(UnreachableStore))
            .await
            .unwrap();

        let err = service.fetch_record(0).await.unwrap_err();
        assert!(matches!(err, LineError::StoreUnavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_independent_of_chunk_size() {
        let lines: Vec<String> = (0..57).map(|i| format!("Line {}", i)).collect();
        let content: String = lines.iter().map(|l| format!("{}\n", l)).collect();

        for chunk_size in [1, 2, 3, 10, 56, 57, 58, 1000] {
            let (service, _dir) = create_test_service(&content, chunk_size).await;

            // Back to front, so the first call forces the longest scan
            for (i, line) in lines.iter().enumerate().rev() {
                let fetched = service.fetch_line(i as i64).await.unwrap();
                assert_eq!(fetched.as_deref(), Some(line.as_str()), "chunk size {}", chunk_size);
            }
            assert!(service.fetch_record(57).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_exact_chunk_multiple_boundary() {
        let (service, _dir) = create_test_service("a\nb\nc\nd\n", 2).await;

        assert_eq!(service.fetch_record(3).await.unwrap().unwrap(), b"d");
        assert!(service.fetch_record(4).await.unwrap().is_none());

        let table = service
            .builder()
            .index()
            .get_chunk_offsets(1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_idempotent_and_memoized() {
        let (service, dir) = create_test_service("x\ny\nz\n", 2).await;

        let first = service.fetch_record(2).await.unwrap();
        let second = service.fetch_record(2).await.unwrap();
        assert_eq!(first, second);

        // Memoized content is served without touching the file
        std::fs::write(dir.path().join("data.txt"), "changed\n").unwrap();
        assert_eq!(service.fetch_record(2).await.unwrap().unwrap(), b"z");

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.cache.local_hits, 2);
        assert_eq!(stats.index.frontier, 2);
        assert_eq!(stats.index.last_chunk, Some(1));
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let (service, _dir) = create_test_service("only\n", 4).await;

        assert!(service.fetch_record(1).await.unwrap().is_none());
        assert!(service.fetch_record(1).await.unwrap().is_none());
        assert_eq!(service.stats().await.unwrap().cache.local_entries, 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_across_processes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let content: String = (0..300).map(|i| format!("row-{}\n", i)).collect();
        std::fs::write(&path, content).unwrap();

        // Several services over one store stand in for separate worker processes
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let mut services = Vec::new();
        for _ in 0..4 {
            let service = LineService::with_store(&test_config(&path, 10), Arc::clone(&store))
                .await
                .unwrap();
            services.push(Arc::new(service));
        }

        let handles = (0..40i64).map(|i| {
            let service = Arc::clone(&services[(i % 4) as usize]);
            tokio::spawn(async move {
                let index = (i * 37) % 300;
                let line = service.fetch_line(index).await.unwrap();
                assert_eq!(line, Some(format!("row-{}", index)));
                index
            })
        });

        let max_index = join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .max()
            .unwrap();

        let stats = services[0].stats().await.unwrap();
        assert!(stats.index.frontier >= (max_index as u64 / 10) + 1);
    }

    #[tokio::test]
    async fn test_chunk_size_change_over_persistent_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let db = dir.path().join("store.db");
        let lines = ["a", "bb", "ccc", "dddd", "eeeee", "ffffff"];
        let content: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        std::fs::write(&path, content).unwrap();

        {
            let store: Arc<dyn CacheStore> = Arc::new(SqliteStore::open(&db).unwrap());
            let service = LineService::with_store(&test_config(&path, 2), store)
                .await
                .unwrap();
            assert_eq!(service.fetch_line(1).await.unwrap().as_deref(), Some("bb"));
        }

        // Restarted with a different chunk size against the same database
        let store: Arc<dyn CacheStore> = Arc::new(SqliteStore::open(&db).unwrap());
        let service = LineService::with_store(&test_config(&path, 3), store)
            .await
            .unwrap();

        assert_eq!(service.fetch_line(4).await.unwrap().as_deref(), Some("eeeee"));
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(service.fetch_line(i as i64).await.unwrap().as_deref(), Some(*line));
        }
        assert!(service.fetch_line(6).await.unwrap().is_none());
        assert_eq!(service.stats().await.unwrap().index.last_chunk, Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_over_shared_sqlite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let db = dir.path().join("store.db");
        let content: String = (0..400).map(|i| format!("row-{}\n", i)).collect();
        std::fs::write(&path, content).unwrap();

        // One connection per service, as separate worker processes would have
        let mut services = Vec::new();
        for _ in 0..4 {
            let store: Arc<dyn CacheStore> = Arc::new(SqliteStore::open(&db).unwrap());
            let service = LineService::with_store(&test_config(&path, 16), store)
                .await
                .unwrap();
            services.push(Arc::new(service));
        }

        let handles = (0..48i64).map(|i| {
            let service = Arc::clone(&services[(i % 4) as usize]);
            tokio::spawn(async move {
                let index = (i * 53) % 400;
                let line = service.fetch_line(index).await.unwrap();
                assert_eq!(line, Some(format!("row-{}", index)));
                index
            })
        });

        let max_index = join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .max()
            .unwrap();

        // Every service sees the same index
        for service in &services {
            let stats = service.stats().await.unwrap();
            assert!(stats.index.frontier >= (max_index as u64 / 16) + 1);
        }
        assert!(services[0].fetch_line(400).await.unwrap().is_none());
        assert_eq!(
            services[1].fetch_line(399).await.unwrap().as_deref(),
            Some("row-399")
        );
        assert!(services[2]
            .builder()
            .coordinator()
            .current_holder()
            .await
            .unwrap()
            .is_none());
    }
}
