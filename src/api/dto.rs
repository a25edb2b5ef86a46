//! Data Transfer Objects
//!
//! Response types for the API endpoints, serialized to JSON.

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::index::IndexStats;
use crate::prewarm::PrewarmStatus;

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Cache store status
    pub store: String,
    /// Cache store backend name
    pub store_backend: String,
    /// Served file
    pub file: String,
    pub chunk_size: u64,
    /// Offset index progress, absent when the store is unreachable
    pub index: Option<IndexStats>,
    pub cache: Option<CacheStats>,
    /// Pre-warm job progress, absent when the job is disabled
    pub prewarm: Option<PrewarmStatus>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}

/// Subset of the health response read back by the CLI
#[derive(Debug, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub store: String,
    pub file: String,
    pub chunk_size: u64,
    pub uptime_seconds: u64,
    pub version: String,
}
