//! Pre-warm Job
//!
//! Builds the whole offset index in the background by asking for a record
//! that cannot exist. The builder scans to the end of the file, so later
//! requests hit the fast path.

use crate::service::LineService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// How the last run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrewarmOutcome {
    Complete,
    /// The file has more records than any index can address
    UnexpectedRecord,
    Failed { error: String },
}

/// Progress of the pre-warm job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrewarmStatus {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<PrewarmOutcome>,
}

impl PrewarmStatus {
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_none()
    }
}

/// Background full-index build
pub struct PrewarmJob {
    service: Arc<LineService>,
    delay: Duration,
    status: RwLock<PrewarmStatus>,
}

impl PrewarmJob {
    pub fn new(service: Arc<LineService>, delay: Duration) -> Self {
        Self {
            service,
            delay,
            status: RwLock::new(PrewarmStatus::default()),
        }
    }

    /// Spawn the job on the current runtime
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let job = self.clone();

        tokio::spawn(async move {
            if !job.delay.is_zero() {
                tokio::time::sleep(job.delay).await;
            }
            job.run_once().await;
        })
    }

    /// Scan the file to the end and record the result
    pub async fn run_once(&self) -> PrewarmOutcome {
        let started = Utc::now();
        {
            let mut status = self.status.write().await;
            status.started_at = Some(started);
            status.finished_at = None;
            status.outcome = None;
        }

        tracing::info!("Pre-warming offset index");

        let outcome = match self.service.fetch_record(i64::MAX).await {
            Ok(None) => {
                let elapsed = Utc::now() - started;
                tracing::info!("Pre-warm complete in {}ms", elapsed.num_milliseconds());
                PrewarmOutcome::Complete
            }
            Ok(Some(_)) => {
                tracing::warn!("Pre-warm found a record at index {}", i64::MAX);
                PrewarmOutcome::UnexpectedRecord
            }
            Err(e) => {
                tracing::error!("Pre-warm failed: {}", e);
                PrewarmOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let mut status = self.status.write().await;
        status.finished_at = Some(Utc::now());
        status.outcome = Some(outcome.clone());
        outcome
    }

    pub async fn status(&self) -> PrewarmStatus {
        self.status.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StoreKind};
    use tempfile::{tempdir, TempDir};

    async fn create_test_job(content: &str, delay: Duration) -> (Arc<PrewarmJob>, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, content).unwrap();

        let mut config = Config::default();
        config.file.path = path;
        config.index.chunk_size = 4;
        config.store.kind = StoreKind::Memory;

        let service = Arc::new(LineService::open(&config).await.unwrap());
        (Arc::new(PrewarmJob::new(service, delay)), dir)
    }

    #[tokio::test]
    async fn test_run_once_builds_whole_index() {
        let content: String = (0..10).map(|i| format!("Line {}\n", i)).collect();
        let (job, _dir) = create_test_job(&content, Duration::ZERO).await;

        assert_eq!(job.run_once().await, PrewarmOutcome::Complete);

        let stats = job.service.stats().await.unwrap();
        assert_eq!(stats.index.frontier, 3);
        assert_eq!(stats.index.last_chunk, Some(2));
        assert_eq!(stats.cache.local_entries, 0);

        let status = job.status().await;
        assert!(!status.is_running());
        assert!(status.finished_at >= status.started_at);
        assert_eq!(status.outcome, Some(PrewarmOutcome::Complete));
    }

    #[tokio::test]
    async fn test_start_runs_in_background() {
        let (job, _dir) = create_test_job("a\nb\n", Duration::from_millis(10)).await;
        assert!(job.status().await.started_at.is_none());

        let handle = Arc::clone(&job).start();
        handle.await.unwrap();

        assert_eq!(job.status().await.outcome, Some(PrewarmOutcome::Complete));
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let (job, dir) = create_test_job("a\nb\n", Duration::ZERO).await;
        std::fs::remove_file(dir.path().join("data.txt")).unwrap();

        match job.run_once().await {
            PrewarmOutcome::Failed { error } => assert!(error.contains("IO error")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
