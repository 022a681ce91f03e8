//! Periodic execution metrics aggregation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

use crate::domain::errors::DomainResult;
use crate::domain::models::config::MetricsConfig;
use crate::domain::models::ExecutionStatus;
use crate::domain::ports::{ExecutionRepository, MetricsSink, MetricsSnapshot, StatusCounts};

pub struct MetricsCollector {
    executions: Arc<dyn ExecutionRepository>,
    sink: Arc<dyn MetricsSink>,
    config: MetricsConfig,
}

impl MetricsCollector {
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        sink: Arc<dyn MetricsSink>,
        config: MetricsConfig,
    ) -> Self {
        Self { executions, sink, config }
    }

    /// Aggregate counts for the trailing hour and day and emit them.
    pub async fn collect(&self, now: DateTime<Utc>) -> DomainResult<MetricsSnapshot> {
        let snapshot = MetricsSnapshot {
            last_hour: self.window_counts(now - Duration::hours(1)).await?,
            last_day: self.window_counts(now - Duration::hours(24)).await?,
        };
        self.sink.record(&snapshot);
        Ok(snapshot)
    }

    async fn window_counts(&self, since: DateTime<Utc>) -> DomainResult<StatusCounts> {
        Ok(StatusCounts {
            pending: self
                .executions
                .count_by_status_since(ExecutionStatus::Pending, since)
                .await?,
            running: self
                .executions
                .count_by_status_since(ExecutionStatus::Running, since)
                .await?,
            success: self
                .executions
                .count_by_status_since(ExecutionStatus::Success, since)
                .await?,
            failed: self
                .executions
                .count_by_status_since(ExecutionStatus::Failed, since)
                .await?,
        })
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = std::time::Duration::from_secs(self.config.interval_seconds.max(1));
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
            if let Err(e) = self.collect(Utc::now()).await {
                tracing::error!(error = %e, "Metrics collection failed");
            }
        }
        tracing::info!("Metrics collector stopped");
    }
}
