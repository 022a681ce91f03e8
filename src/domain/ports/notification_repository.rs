//! OAuth notification repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{NotificationKind, OAuthNotification};

/// Persistence port for OAuth failure notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &OAuthNotification) -> DomainResult<()>;

    /// The unresolved notification for `(owner, service, kind)`, if any.
    async fn find_open(
        &self,
        owner: &str,
        service: &str,
        kind: NotificationKind,
    ) -> DomainResult<Option<OAuthNotification>>;

    /// Replace the message of an existing notification in place.
    async fn update_message(&self, id: Uuid, message: &str) -> DomainResult<()>;

    /// Resolve every open notification for `(owner, service)`.
    /// Returns the number of notifications resolved.
    async fn resolve_all(
        &self,
        owner: &str,
        service: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<u64>;

    async fn list_open_for_owner(&self, owner: &str) -> DomainResult<Vec<OAuthNotification>>;
}
