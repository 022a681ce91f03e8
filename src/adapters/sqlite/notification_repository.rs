//! SQLite implementation of the NotificationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{NotificationKind, OAuthNotification};
use crate::domain::ports::NotificationRepository;

use super::execution_repository::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn insert(&self, notification: &OAuthNotification) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO oauth_notifications (id, owner, service, kind, message,
               is_read, is_resolved, created_at, resolved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(notification.id.to_string())
        .bind(&notification.owner)
        .bind(&notification.service)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.is_resolved)
        .bind(notification.created_at.to_rfc3339())
        .bind(notification.resolved_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_open(
        &self,
        owner: &str,
        service: &str,
        kind: NotificationKind,
    ) -> DomainResult<Option<OAuthNotification>> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "SELECT * FROM oauth_notifications
             WHERE owner = ? AND service = ? AND kind = ? AND is_resolved = 0",
        )
        .bind(owner)
        .bind(service)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OAuthNotification::try_from).transpose()
    }

    async fn update_message(&self, id: Uuid, message: &str) -> DomainResult<()> {
        sqlx::query("UPDATE oauth_notifications SET message = ? WHERE id = ?")
            .bind(message)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn resolve_all(
        &self,
        owner: &str,
        service: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            "UPDATE oauth_notifications SET is_resolved = 1, resolved_at = ?
             WHERE owner = ? AND service = ? AND is_resolved = 0",
        )
        .bind(at.to_rfc3339())
        .bind(owner)
        .bind(service)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_open_for_owner(&self, owner: &str) -> DomainResult<Vec<OAuthNotification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM oauth_notifications WHERE owner = ? AND is_resolved = 0
             ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OAuthNotification::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    owner: String,
    service: String,
    kind: String,
    message: String,
    is_read: bool,
    is_resolved: bool,
    created_at: String,
    resolved_at: Option<String>,
}

impl TryFrom<NotificationRow> for OAuthNotification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(OAuthNotification {
            id: parse_uuid(&row.id)?,
            owner: row.owner,
            service: row.service,
            kind: NotificationKind::from_str(&row.kind).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown notification kind '{}'", row.kind))
            })?,
            message: row.message,
            is_read: row.is_read,
            is_resolved: row.is_resolved,
            created_at: parse_timestamp(&row.created_at)?,
            resolved_at: row.resolved_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}
