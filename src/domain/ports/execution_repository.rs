//! Execution repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Execution, ExecutionStatus};

/// Persistence port for executions.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Insert a new execution.
    ///
    /// Returns [`DomainError::UniquenessConflict`](crate::domain::DomainError)
    /// when an execution with the same `(automation_id, external_event_id)`
    /// already exists; this is the at-most-once anchor.
    async fn insert(&self, execution: &Execution) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Execution>>;

    async fn update(&self, execution: &Execution) -> DomainResult<()>;

    async fn list_by_status(
        &self,
        status: ExecutionStatus,
        limit: u32,
    ) -> DomainResult<Vec<Execution>>;

    /// Running executions whose last update is older than `older_than`,
    /// candidates for the reclaim sweep.
    async fn list_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> DomainResult<Vec<Execution>>;

    /// Count executions with `status` created at or after `since`.
    async fn count_by_status_since(
        &self,
        status: ExecutionStatus,
        since: DateTime<Utc>,
    ) -> DomainResult<u64>;

    /// Delete executions with `status` created before `cutoff`.
    /// Returns the number of rows removed. Callers only pass terminal
    /// statuses; pending/running rows are never eligible.
    async fn delete_older_than(
        &self,
        status: ExecutionStatus,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<u64>;
}
