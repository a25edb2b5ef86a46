//! Build Coordinator - one global lock over index extension
//!
//! Acquisition is a single `set_if_absent` on the lock key; nothing else is
//! load bearing. The stored `LockInfo` only tells operators who is scanning.
//!
//! The lock is released through a scoped guard: `BuildLock::release` on the
//! normal path, and the guard's `Drop` on every other path. The key carries a
//! TTL so that a process that dies while holding it cannot wedge the index
//! forever; a live holder calls `BuildLock::extend` between chunks to keep it.
//!
//! Release and extend only touch the key while it still names this holder.
//! A holder that stalled past the TTL finds someone else's lock there and
//! leaves it alone.

use crate::index::{ChunkId, IndexResult, KeySpace};
use crate::store::{now_ms, CacheStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Informational lock value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process that took the lock
    pub holder: String,
    /// Chunk the holder set out to build
    pub chunk: ChunkId,
    pub acquired_at_ms: i64,
}

/// Hands out the build lock for one file
#[derive(Clone)]
pub struct BuildCoordinator {
    store: Arc<dyn CacheStore>,
    key: String,
    ttl: Duration,
    holder: String,
}

impl BuildCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, keys: &KeySpace, ttl: Duration) -> Self {
        let holder = format!(
            "pid-{}-{}",
            std::process::id(),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        Self {
            store,
            key: keys.build_lock(),
            ttl,
            holder,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Try to become the builder. `None` means someone else holds the lock.
    pub async fn try_acquire(&self, chunk: ChunkId) -> IndexResult<Option<BuildLock>> {
        let info = LockInfo {
            holder: self.holder.clone(),
            chunk,
            acquired_at_ms: now_ms(),
        };
        let value = bincode::serialize(&info)?;

        if !self
            .store
            .set_if_absent(&self.key, &value, Some(self.ttl))
            .await?
        {
            return Ok(None);
        }

        tracing::debug!(holder = %self.holder, chunk, "Build lock acquired");

        Ok(Some(BuildLock {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            ttl: self.ttl,
            info,
            released: false,
        }))
    }

    /// Who holds the lock right now, if anyone
    pub async fn current_holder(&self) -> IndexResult<Option<LockInfo>> {
        match self.store.get(&self.key).await? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Delete the lock key if `holder` still owns it. Returns whether it did.
async fn delete_if_held(store: &dyn CacheStore, key: &str, holder: &str) -> IndexResult<bool> {
    let Some(bytes) = store.get(key).await? else {
        return Ok(false);
    };
    let current: LockInfo = bincode::deserialize(&bytes)?;
    if current.holder != holder {
        return Ok(false);
    }

    store.delete(key).await?;
    Ok(true)
}

/// Held build lock. Deleted on release or drop.
pub struct BuildLock {
    store: Arc<dyn CacheStore>,
    key: String,
    ttl: Duration,
    info: LockInfo,
    released: bool,
}

impl BuildLock {
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Push the expiry out by a full TTL.
    ///
    /// Returns `false` if the lock expired and is now absent or held by
    /// someone else; the caller must stop writing to the index.
    pub async fn extend(&self) -> IndexResult<bool> {
        let Some(bytes) = self.store.get(&self.key).await? else {
            return Ok(false);
        };
        let current: LockInfo = bincode::deserialize(&bytes)?;
        if current.holder != self.info.holder {
            return Ok(false);
        }

        let value = bincode::serialize(&self.info)?;
        self.store.set(&self.key, &value, Some(self.ttl)).await?;
        Ok(true)
    }

    /// Delete the lock key, unless it has passed to another holder
    pub async fn release(mut self) -> IndexResult<()> {
        let deleted = delete_if_held(self.store.as_ref(), &self.key, &self.info.holder).await?;
        self.released = true;

        if deleted {
            tracing::debug!(holder = %self.info.holder, chunk = self.info.chunk, "Build lock released");
        } else {
            tracing::warn!(holder = %self.info.holder, "Build lock was no longer ours at release");
        }
        Ok(())
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        let holder = std::mem::take(&mut self.info.holder);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = delete_if_held(store.as_ref(), &key, &holder).await {
                        tracing::warn!("Failed to release build lock {}: {}", key, e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("No runtime to release build lock {}, leaving it to expire", key);
            }
        }
    }
}
