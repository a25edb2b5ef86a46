//! Line service error types
//!
//! A record that does not exist is not an error: `fetch_record` returns
//! `Ok(None)` for it. Everything here is either a caller mistake
//! (`InvalidIndex`) or a transient failure an outer layer may retry.

use crate::index::IndexError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the line service
#[derive(Error, Debug)]
pub enum LineError {
    /// Negative record index
    #[error("Invalid index: {0}")]
    InvalidIndex(i64),

    /// The shared cache store cannot be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Reading the backing file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index state in the store is unreadable
    #[error("Corrupt index: {0}")]
    Corrupt(String),
}

impl LineError {
    /// Worth retrying the whole request later
    pub fn is_transient(&self) -> bool {
        matches!(self, LineError::StoreUnavailable(_) | LineError::Io(_))
    }
}

impl From<StoreError> for LineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => LineError::Io(e),
            StoreError::Serialization(msg) => LineError::Corrupt(msg),
            other => LineError::StoreUnavailable(other),
        }
    }
}

impl From<IndexError> for LineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Store(e) => e.into(),
            IndexError::Io(e) => LineError::Io(e),
            IndexError::Corrupt(msg) => LineError::Corrupt(msg),
        }
    }
}

/// Result type alias for line service operations
pub type LineResult<T> = Result<T, LineError>;
