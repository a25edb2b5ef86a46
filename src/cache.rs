//! Content cache - memoized record bytes keyed by record index
//!
//! Two levels, checked in order:
//!
//! 1. a per-process LRU, bounded by entry count
//! 2. the shared cache store, entries expire after `content_ttl`
//!
//! Only successful reads are cached; a missing record is never stored.
//! The content cache is independent of the offset index: dropping it
//! costs re-reads, never correctness.

use crate::index::{KeySpace, RecordIndex};
use crate::store::{CacheStore, StoreResult};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Hit/miss counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub local_hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub local_entries: usize,
}

/// Record memoization in front of the file reader
pub struct ContentCache {
    store: Arc<dyn CacheStore>,
    keys: KeySpace,
    /// None when the local capacity is zero
    local: Option<Mutex<LruCache<RecordIndex, Vec<u8>>>>,
    ttl: Duration,
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        keys: KeySpace,
        local_capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            keys,
            local: NonZeroUsize::new(local_capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl,
            local_hits: AtomicU64::new(0),
            shared_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached bytes for a record, if any level has them
    pub async fn get(&self, index: RecordIndex) -> StoreResult<Option<Vec<u8>>> {
        if let Some(local) = &self.local {
            if let Some(value) = local.lock().await.get(&index) {
                self.local_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(value.clone()));
            }
        }

        match self.store.get(&self.keys.line(index)).await? {
            Some(value) => {
                self.shared_hits.fetch_add(1, Ordering::Relaxed);
                if let Some(local) = &self.local {
                    local.lock().await.put(index, value.clone());
                }
                Ok(Some(value))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Memoize a record that was just read
    pub async fn put(&self, index: RecordIndex, value: &[u8]) -> StoreResult<()> {
        self.store
            .set(&self.keys.line(index), value, Some(self.ttl))
            .await?;

        if let Some(local) = &self.local {
            local.lock().await.put(index, value.to_vec());
        }
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        let local_entries = match &self.local {
            Some(local) => local.lock().await.len(),
            None => 0,
        };

        CacheStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            shared_hits: self.shared_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            local_entries,
        }
    }
}
