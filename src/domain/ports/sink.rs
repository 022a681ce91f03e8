//! Pluggable sinks for metrics and operator alerts.

use async_trait::async_trait;

use crate::domain::models::Execution;

/// Per-status execution counts over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub running: u64,
    pub success: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.running + self.success + self.failed
    }

    /// Success rate over completed executions, in [0, 1].
    pub fn success_rate(&self) -> Option<f64> {
        let completed = self.success + self.failed;
        if completed == 0 {
            None
        } else {
            Some(self.success as f64 / completed as f64)
        }
    }
}

/// Aggregated execution metrics for the trailing 1h / 24h windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub last_hour: StatusCounts,
    pub last_day: StatusCounts,
}

/// Destination for periodic metrics snapshots.
pub trait MetricsSink: Send + Sync {
    fn record(&self, snapshot: &MetricsSnapshot);
}

/// Destination for dead-letter alerts. Integration with a real alerting
/// system is a deployment concern; the default sink logs.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dead_letter(&self, execution: &Execution);
}

/// Default sink that emits through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, snapshot: &MetricsSnapshot) {
        tracing::info!(
            hour_success = snapshot.last_hour.success,
            hour_failed = snapshot.last_hour.failed,
            hour_rate = ?snapshot.last_hour.success_rate(),
            day_success = snapshot.last_day.success,
            day_failed = snapshot.last_day.failed,
            day_rate = ?snapshot.last_day.success_rate(),
            "Execution metrics"
        );
    }
}

#[async_trait]
impl AlertSink for TracingSink {
    async fn dead_letter(&self, execution: &Execution) {
        tracing::error!(
            execution_id = %execution.id,
            automation_id = %execution.automation_id,
            attempts = execution.attempt_count,
            "Execution moved to dead letter queue"
        );
    }
}
