//! SQLite implementation of the ExecutionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Execution, ExecutionStatus};
use crate::domain::ports::ExecutionRepository;

#[derive(Clone)]
pub struct SqliteExecutionRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionRepository for SqliteExecutionRepository {
    async fn insert(&self, execution: &Execution) -> DomainResult<()> {
        let trigger_json = serde_json::to_string(&execution.trigger_data)?;
        let result_json = execution
            .result_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"INSERT INTO executions (id, automation_id, external_event_id, status,
               trigger_data, result_data, error_message, attempt_count,
               created_at, started_at, completed_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.automation_id.to_string())
        .bind(&execution.external_event_id)
        .bind(execution.status.as_str())
        .bind(&trigger_json)
        .bind(&result_json)
        .bind(&execution.error_message)
        .bind(execution.attempt_count as i64)
        .bind(execution.created_at.to_rfc3339())
        .bind(execution.started_at.map(|t| t.to_rfc3339()))
        .bind(execution.completed_at.map(|t| t.to_rfc3339()))
        .bind(execution.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(DomainError::UniquenessConflict {
                    automation_id: execution.automation_id,
                    external_event_id: execution.external_event_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Execution>> {
        let row: Option<ExecutionRow> = sqlx::query_as("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Execution::try_from).transpose()
    }

    async fn update(&self, execution: &Execution) -> DomainResult<()> {
        let trigger_json = serde_json::to_string(&execution.trigger_data)?;
        let result_json = execution
            .result_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"UPDATE executions SET status = ?, trigger_data = ?, result_data = ?,
               error_message = ?, attempt_count = ?, started_at = ?, completed_at = ?,
               updated_at = ?
               WHERE id = ?"#,
        )
        .bind(execution.status.as_str())
        .bind(&trigger_json)
        .bind(&result_json)
        .bind(&execution.error_message)
        .bind(execution.attempt_count as i64)
        .bind(execution.started_at.map(|t| t.to_rfc3339()))
        .bind(execution.completed_at.map(|t| t.to_rfc3339()))
        .bind(execution.updated_at.to_rfc3339())
        .bind(execution.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ExecutionNotFound(execution.id));
        }

        Ok(())
    }

    async fn list_by_status(
        &self,
        status: ExecutionStatus,
        limit: u32,
    ) -> DomainResult<Vec<Execution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            "SELECT * FROM executions WHERE status = ? ORDER BY created_at ASC LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Execution::try_from).collect()
    }

    async fn list_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> DomainResult<Vec<Execution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            "SELECT * FROM executions WHERE status = 'running' AND updated_at < ?
             ORDER BY updated_at ASC",
        )
        .bind(older_than.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Execution::try_from).collect()
    }

    async fn count_by_status_since(
        &self,
        status: ExecutionStatus,
        since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM executions WHERE status = ? AND created_at >= ?",
        )
        .bind(status.as_str())
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn delete_older_than(
        &self,
        status: ExecutionStatus,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM executions WHERE status = ? AND created_at < ?")
            .bind(status.as_str())
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    automation_id: String,
    external_event_id: String,
    status: String,
    trigger_data: String,
    result_data: Option<String>,
    error_message: Option<String>,
    attempt_count: i64,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    updated_at: String,
}

impl TryFrom<ExecutionRow> for Execution {
    type Error = DomainError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        Ok(Execution {
            id: parse_uuid(&row.id)?,
            automation_id: parse_uuid(&row.automation_id)?,
            external_event_id: row.external_event_id,
            status: ExecutionStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown execution status '{}'", row.status))
            })?,
            trigger_data: serde_json::from_str(&row.trigger_data)?,
            result_data: row.result_data.as_deref().map(serde_json::from_str).transpose()?,
            error_message: row.error_message,
            attempt_count: row.attempt_count.max(0) as u32,
            created_at: parse_timestamp(&row.created_at)?,
            started_at: row.started_at.as_deref().map(parse_timestamp).transpose()?,
            completed_at: row.completed_at.as_deref().map(parse_timestamp).transpose()?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

pub(crate) fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| DomainError::SerializationError(format!("invalid uuid '{s}': {e}")))
}

pub(crate) fn parse_timestamp(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::SerializationError(format!("invalid timestamp '{s}': {e}")))
}
