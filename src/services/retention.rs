//! Execution retention sweep.
//!
//! Deletes terminal executions past their retention thresholds. Pending
//! and running rows are never touched; they may still progress.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

use crate::domain::errors::DomainResult;
use crate::domain::models::config::RetentionConfig;
use crate::domain::models::ExecutionStatus;
use crate::domain::ports::ExecutionRepository;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSummary {
    pub success_deleted: u64,
    pub failed_deleted: u64,
}

pub struct RetentionTask {
    executions: Arc<dyn ExecutionRepository>,
    config: RetentionConfig,
}

impl RetentionTask {
    pub fn new(executions: Arc<dyn ExecutionRepository>, config: RetentionConfig) -> Self {
        Self { executions, config }
    }

    /// Delete expired terminal executions as of `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> DomainResult<RetentionSummary> {
        let success_cutoff = now - Duration::days(self.config.retention_success_days as i64);
        let failed_cutoff = now - Duration::days(self.config.retention_failed_days as i64);

        let success_deleted = self
            .executions
            .delete_older_than(ExecutionStatus::Success, success_cutoff)
            .await?;
        let failed_deleted = self
            .executions
            .delete_older_than(ExecutionStatus::Failed, failed_cutoff)
            .await?;

        if success_deleted + failed_deleted > 0 {
            tracing::info!(
                success_deleted,
                failed_deleted,
                "Retention sweep removed expired executions"
            );
        }

        Ok(RetentionSummary { success_deleted, failed_deleted })
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = std::time::Duration::from_secs(self.config.sweep_interval_seconds.max(1));
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
            if let Err(e) = self.sweep(Utc::now()).await {
                tracing::error!(error = %e, "Retention sweep failed");
            }
        }
        tracing::info!("Retention task stopped");
    }
}
