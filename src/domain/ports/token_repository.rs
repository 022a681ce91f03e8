//! Service token repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::ServiceToken;

/// New credential values persisted after a successful refresh.
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Some providers rotate the refresh token on every refresh.
    pub refresh_token: Option<String>,
}

/// Persistence port for service tokens.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get(&self, owner: &str, service: &str) -> DomainResult<Option<ServiceToken>>;

    /// Insert or replace the token row for `(owner, service)`.
    async fn upsert(&self, token: &ServiceToken) -> DomainResult<()>;

    /// Conditionally persist refreshed credentials.
    ///
    /// The update only applies while the stored `expires_at` still equals
    /// `previous_expires_at`, a compare-and-set that lets concurrent
    /// refreshers in other processes detect that someone else already
    /// refreshed. Returns whether the row was updated.
    async fn update_after_refresh(
        &self,
        owner: &str,
        service: &str,
        previous_expires_at: Option<DateTime<Utc>>,
        update: &TokenUpdate,
    ) -> DomainResult<bool>;

    /// Stamp `last_used_at` without touching `updated_at`.
    async fn mark_used(&self, owner: &str, service: &str, at: DateTime<Utc>) -> DomainResult<()>;

    /// Owners holding a token for `service`. Drives poller fan-out.
    async fn owners_with_token(&self, service: &str) -> DomainResult<Vec<String>>;
}
