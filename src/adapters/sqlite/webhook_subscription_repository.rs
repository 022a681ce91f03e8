//! SQLite implementation of the WebhookSubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{WebhookSubscription, WebhookSubscriptionStatus};
use crate::domain::ports::WebhookSubscriptionRepository;

use super::execution_repository::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteWebhookSubscriptionRepository {
    pool: SqlitePool,
}

impl SqliteWebhookSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookSubscriptionRepository for SqliteWebhookSubscriptionRepository {
    async fn insert(&self, subscription: &WebhookSubscription) -> DomainResult<()> {
        let config = serde_json::to_string(&subscription.config)?;

        sqlx::query(
            r#"INSERT INTO webhook_subscriptions (id, owner, service, external_subscription_id,
               event_type, config, status, event_count, last_event_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(subscription.id.to_string())
        .bind(&subscription.owner)
        .bind(&subscription.service)
        .bind(&subscription.external_subscription_id)
        .bind(&subscription.event_type)
        .bind(&config)
        .bind(subscription.status.as_str())
        .bind(subscription.event_count)
        .bind(subscription.last_event_at.map(|t| t.to_rfc3339()))
        .bind(subscription.created_at.to_rfc3339())
        .bind(subscription.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<WebhookSubscription>> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as("SELECT * FROM webhook_subscriptions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(WebhookSubscription::try_from).transpose()
    }

    async fn list_active(
        &self,
        owner: &str,
        service: &str,
    ) -> DomainResult<Vec<WebhookSubscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT * FROM webhook_subscriptions
             WHERE owner = ? AND service = ? AND status = 'active'
             ORDER BY created_at ASC",
        )
        .bind(owner)
        .bind(service)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WebhookSubscription::try_from).collect()
    }

    async fn list_active_by_event(
        &self,
        owner: &str,
        service: &str,
        event_type: &str,
    ) -> DomainResult<Vec<WebhookSubscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            "SELECT * FROM webhook_subscriptions
             WHERE owner = ? AND service = ? AND event_type = ? AND status = 'active'
             ORDER BY created_at ASC",
        )
        .bind(owner)
        .bind(service)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WebhookSubscription::try_from).collect()
    }

    async fn set_status(&self, id: Uuid, status: WebhookSubscriptionStatus) -> DomainResult<()> {
        sqlx::query("UPDATE webhook_subscriptions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_event(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query(
            "UPDATE webhook_subscriptions
             SET event_count = event_count + 1, last_event_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    owner: String,
    service: String,
    external_subscription_id: Option<String>,
    event_type: String,
    config: String,
    status: String,
    event_count: i64,
    last_event_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SubscriptionRow> for WebhookSubscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(WebhookSubscription {
            id: parse_uuid(&row.id)?,
            owner: row.owner,
            service: row.service,
            external_subscription_id: row.external_subscription_id,
            event_type: row.event_type,
            config: serde_json::from_str(&row.config)?,
            status: WebhookSubscriptionStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!(
                    "unknown subscription status '{}'",
                    row.status
                ))
            })?,
            event_count: row.event_count,
            last_event_at: row.last_event_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
