//! SQLite implementation of the TokenRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ServiceToken;
use crate::domain::ports::{TokenRepository, TokenUpdate};

use super::execution_repository::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn get(&self, owner: &str, service: &str) -> DomainResult<Option<ServiceToken>> {
        let row: Option<TokenRow> =
            sqlx::query_as("SELECT * FROM service_tokens WHERE owner = ? AND service = ?")
                .bind(owner)
                .bind(service)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ServiceToken::try_from).transpose()
    }

    async fn upsert(&self, token: &ServiceToken) -> DomainResult<()> {
        let scopes = serde_json::to_string(&token.scopes)?;

        sqlx::query(
            r#"INSERT INTO service_tokens (id, owner, service, access_token, refresh_token,
               expires_at, scopes, token_type, last_used_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(owner, service) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = excluded.refresh_token,
                 expires_at = excluded.expires_at,
                 scopes = excluded.scopes,
                 token_type = excluded.token_type,
                 updated_at = excluded.updated_at"#,
        )
        .bind(token.id.to_string())
        .bind(&token.owner)
        .bind(&token.service)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at.map(|t| t.to_rfc3339()))
        .bind(&scopes)
        .bind(&token.token_type)
        .bind(token.last_used_at.map(|t| t.to_rfc3339()))
        .bind(token.created_at.to_rfc3339())
        .bind(token.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_after_refresh(
        &self,
        owner: &str,
        service: &str,
        previous_expires_at: Option<DateTime<Utc>>,
        update: &TokenUpdate,
    ) -> DomainResult<bool> {
        // The expires_at guard makes the write a compare-and-set: a
        // concurrent refresher in another process that already persisted a
        // new expiry causes this update to affect zero rows.
        let result = sqlx::query(
            r#"UPDATE service_tokens
               SET access_token = ?,
                   expires_at = ?,
                   refresh_token = COALESCE(?, refresh_token),
                   updated_at = ?
               WHERE owner = ? AND service = ?
                 AND ((expires_at IS NULL AND ? IS NULL) OR expires_at = ?)"#,
        )
        .bind(&update.access_token)
        .bind(update.expires_at.map(|t| t.to_rfc3339()))
        .bind(&update.refresh_token)
        .bind(Utc::now().to_rfc3339())
        .bind(owner)
        .bind(service)
        .bind(previous_expires_at.map(|t| t.to_rfc3339()))
        .bind(previous_expires_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_used(&self, owner: &str, service: &str, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query("UPDATE service_tokens SET last_used_at = ? WHERE owner = ? AND service = ?")
            .bind(at.to_rfc3339())
            .bind(owner)
            .bind(service)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn owners_with_token(&self, service: &str) -> DomainResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT owner FROM service_tokens WHERE service = ? ORDER BY owner")
                .bind(service)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(owner,)| owner).collect())
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    owner: String,
    service: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    scopes: String,
    token_type: String,
    last_used_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TokenRow> for ServiceToken {
    type Error = DomainError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(ServiceToken {
            id: parse_uuid(&row.id)?,
            owner: row.owner,
            service: row.service,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at.as_deref().map(parse_timestamp).transpose()?,
            scopes: serde_json::from_str(&row.scopes)?,
            token_type: row.token_type,
            last_used_at: row.last_used_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
