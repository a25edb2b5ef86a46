//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::ApiConfig;
use crate::prewarm::PrewarmJob;
use crate::service::LineService;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Line service for the served file
    pub service: Arc<LineService>,
    /// Background pre-warm job, when enabled
    pub prewarm: Option<Arc<PrewarmJob>>,
    /// Upper bound on a single line request, build waits included
    pub request_timeout: Duration,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<LineService>, config: &ApiConfig) -> Self {
        Self {
            service,
            prewarm: None,
            request_timeout: config.request_timeout(),
            start_time: Instant::now(),
        }
    }

    /// Attach the pre-warm job so health output reports its progress
    pub fn with_prewarm(mut self, job: Arc<PrewarmJob>) -> Self {
        self.prewarm = Some(job);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
