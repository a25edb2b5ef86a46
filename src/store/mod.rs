//! Shared Cache Store
//!
//! The cache store is the only shared mutable state in lineseek. Every
//! cooperating process talks to the same store; offset tables, the build
//! frontier, the build lock and memoized records all live here.
//!
//! - **memory**: in-process map, for single-process deployments and tests
//! - **sqlite**: SQLite database file shared by every process on the host
//! - **error**: Error types
//!
//! # Contract
//!
//! ```text
//! get(key)                       → Option<bytes>
//! set(key, bytes, ttl)           → ()
//! set_if_absent(key, bytes, ttl) → bool     (atomic, expired == absent)
//! exists(key)                    → bool
//! delete(key)                    → ()
//! ```
//!
//! A write is visible to the next read of the same key from the same process.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreConfig, StoreKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Generic key/value cache store shared by all processes serving one file
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name, for logs and health output
    fn name(&self) -> &'static str;

    /// Read a value; expired entries read as absent
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value unconditionally
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()>;

    /// Write a value only if the key is absent (or expired).
    ///
    /// Returns `true` if this call wrote the value.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Check whether a live entry exists
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Verify the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Open the store selected by configuration
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn CacheStore>> {
    match config.kind {
        StoreKind::Memory => {
            tracing::info!("Using in-process memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Sqlite => {
            tracing::info!("Using SQLite store at {:?}", config.path);
            Ok(Arc::new(SqliteStore::open(&config.path)?))
        }
    }
}

/// Current wall-clock time in milliseconds since the epoch
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Absolute expiry in milliseconds for an optional TTL
pub(crate) fn expires_at(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now_ms() + ttl.as_millis() as i64)
}
