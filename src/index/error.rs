//! Offset index error types

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur while reading or extending the offset index
#[derive(Error, Debug)]
pub enum IndexError {
    /// The shared cache store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Reading the backing file failed during a scan
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored table or frontier does not decode or is inconsistent
    #[error("Corrupt index: {0}")]
    Corrupt(String),
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Corrupt(err.to_string())
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
