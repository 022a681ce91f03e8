//! SQLite implementation of the ActionStateRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ActionState;
use crate::domain::ports::ActionStateRepository;

use super::execution_repository::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteActionStateRepository {
    pool: SqlitePool,
}

impl SqliteActionStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionStateRepository for SqliteActionStateRepository {
    async fn get(&self, automation_id: Uuid) -> DomainResult<Option<ActionState>> {
        let row: Option<ActionStateRow> =
            sqlx::query_as("SELECT * FROM action_states WHERE automation_id = ?")
                .bind(automation_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(ActionState::try_from).transpose()
    }

    async fn upsert(&self, state: &ActionState) -> DomainResult<()> {
        let metadata = serde_json::to_string(&state.metadata)?;

        sqlx::query(
            r#"INSERT INTO action_states (automation_id, last_checked_at, last_event_id, metadata, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(automation_id) DO UPDATE SET
                 last_checked_at = excluded.last_checked_at,
                 last_event_id = excluded.last_event_id,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at"#,
        )
        .bind(state.automation_id.to_string())
        .bind(state.last_checked_at.map(|t| t.to_rfc3339()))
        .bind(&state.last_event_id)
        .bind(&metadata)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, automation_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM action_states WHERE automation_id = ?")
            .bind(automation_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ActionStateRow {
    automation_id: String,
    last_checked_at: Option<String>,
    last_event_id: Option<String>,
    metadata: String,
    updated_at: String,
}

impl TryFrom<ActionStateRow> for ActionState {
    type Error = DomainError;

    fn try_from(row: ActionStateRow) -> Result<Self, Self::Error> {
        Ok(ActionState {
            automation_id: parse_uuid(&row.automation_id)?,
            last_checked_at: row.last_checked_at.as_deref().map(parse_timestamp).transpose()?,
            last_event_id: row.last_event_id,
            metadata: serde_json::from_str(&row.metadata)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
