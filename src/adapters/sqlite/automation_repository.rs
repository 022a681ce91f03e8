//! SQLite implementation of the AutomationRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Automation, AutomationStatus};
use crate::domain::ports::AutomationRepository;

use super::execution_repository::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn list_with_clause(
        &self,
        owner: Option<&str>,
        action_names: &[&str],
    ) -> DomainResult<Vec<Automation>> {
        if action_names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; action_names.len()].join(", ");
        let mut query = format!(
            "SELECT * FROM automations WHERE status = 'active' AND action_name IN ({placeholders})"
        );
        if owner.is_some() {
            query.push_str(" AND owner = ?");
        }
        query.push_str(" ORDER BY created_at ASC");

        let mut q = sqlx::query_as::<_, AutomationRow>(&query);
        for name in action_names {
            q = q.bind(*name);
        }
        if let Some(owner) = owner {
            q = q.bind(owner);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Automation::try_from).collect()
    }
}

#[async_trait]
impl AutomationRepository for SqliteAutomationRepository {
    async fn create(&self, automation: &Automation) -> DomainResult<()> {
        let action_config = serde_json::to_string(&automation.action_config)?;
        let reaction_config = serde_json::to_string(&automation.reaction_config)?;

        sqlx::query(
            r#"INSERT INTO automations (id, owner, display_name, action_name, action_config,
               reaction_name, reaction_config, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(automation.id.to_string())
        .bind(&automation.owner)
        .bind(&automation.display_name)
        .bind(&automation.action_name)
        .bind(&action_config)
        .bind(&automation.reaction_name)
        .bind(&reaction_config)
        .bind(automation.status.as_str())
        .bind(automation.created_at.to_rfc3339())
        .bind(automation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Automation>> {
        let row: Option<AutomationRow> = sqlx::query_as("SELECT * FROM automations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Automation::try_from).transpose()
    }

    async fn update(&self, automation: &Automation) -> DomainResult<()> {
        let action_config = serde_json::to_string(&automation.action_config)?;
        let reaction_config = serde_json::to_string(&automation.reaction_config)?;

        let result = sqlx::query(
            r#"UPDATE automations SET owner = ?, display_name = ?, action_name = ?,
               action_config = ?, reaction_name = ?, reaction_config = ?, status = ?,
               updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&automation.owner)
        .bind(&automation.display_name)
        .bind(&automation.action_name)
        .bind(&action_config)
        .bind(&automation.reaction_name)
        .bind(&reaction_config)
        .bind(automation.status.as_str())
        .bind(automation.updated_at.to_rfc3339())
        .bind(automation.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AutomationNotFound(automation.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM automations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AutomationNotFound(id));
        }

        Ok(())
    }

    async fn list_active_by_actions(&self, action_names: &[&str]) -> DomainResult<Vec<Automation>> {
        self.list_with_clause(None, action_names).await
    }

    async fn list_active_by_owner_and_actions(
        &self,
        owner: &str,
        action_names: &[&str],
    ) -> DomainResult<Vec<Automation>> {
        self.list_with_clause(Some(owner), action_names).await
    }
}

#[derive(sqlx::FromRow)]
struct AutomationRow {
    id: String,
    owner: String,
    display_name: String,
    action_name: String,
    action_config: String,
    reaction_name: String,
    reaction_config: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AutomationRow> for Automation {
    type Error = DomainError;

    fn try_from(row: AutomationRow) -> Result<Self, Self::Error> {
        Ok(Automation {
            id: parse_uuid(&row.id)?,
            owner: row.owner,
            display_name: row.display_name,
            action_name: row.action_name,
            action_config: serde_json::from_str(&row.action_config)?,
            reaction_name: row.reaction_name,
            reaction_config: serde_json::from_str(&row.reaction_config)?,
            status: AutomationStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!(
                    "unknown automation status '{}'",
                    row.status
                ))
            })?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
