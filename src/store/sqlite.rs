//! SQLite cache store
//!
//! A single `kv` table in a database file that every process on the host
//! opens. SQLite's file locking makes the conditional insert used by
//! `set_if_absent` atomic across processes, which is all the build lock needs.
//!
//! ```sql
//! CREATE TABLE kv (
//!     key        TEXT PRIMARY KEY,
//!     value      BLOB NOT NULL,
//!     expires_at INTEGER           -- ms since epoch, NULL = never
//! );
//! ```

use crate::store::{expires_at, now_ms, CacheStore, StoreError, StoreResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a statement waits on another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache store backed by a shared SQLite file
pub struct SqliteStore {
    /// std::sync::Mutex because the connection is !Sync
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Create or open the store at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER
            )",
            [],
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        };

        let purged = store.purge_expired()?;
        if purged > 0 {
            tracing::debug!("Purged {} expired entries from {:?}", purged, store.path);
        }

        Ok(store)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every expired row, returning how many were removed
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?",
            params![now_ms()],
        )?;
        Ok(removed)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let row: Option<(Vec<u8>, Option<i64>)> = conn
            .prepare_cached("SELECT value, expires_at FROM kv WHERE key = ?")?
            .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let now = now_ms();
        Ok(row.and_then(|(value, expires_at)| match expires_at {
            Some(at) if now >= at => None,
            _ => Some(value),
        }))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.prepare_cached("INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?, ?, ?)")?
            .execute(params![key, value, expires_at(ttl)])?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // An expired holder no longer counts
        tx.execute(
            "DELETE FROM kv WHERE key = ? AND expires_at IS NOT NULL AND expires_at <= ?",
            params![key, now_ms()],
        )?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO kv (key, value, expires_at) VALUES (?, ?, ?)",
            params![key, value, expires_at(ttl)],
        )?;

        tx.commit()?;
        Ok(inserted == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.prepare_cached("DELETE FROM kv WHERE key = ?")?
            .execute(params![key])?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
