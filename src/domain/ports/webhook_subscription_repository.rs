//! Webhook subscription repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{WebhookSubscription, WebhookSubscriptionStatus};

/// Persistence port for upstream webhook subscriptions.
#[async_trait]
pub trait WebhookSubscriptionRepository: Send + Sync {
    async fn insert(&self, subscription: &WebhookSubscription) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<WebhookSubscription>>;

    /// Active subscriptions for `(owner, service)`.
    async fn list_active(&self, owner: &str, service: &str) -> DomainResult<Vec<WebhookSubscription>>;

    /// Active subscriptions for `(owner, service, event_type)`. Drives the
    /// poller's smart skip.
    async fn list_active_by_event(
        &self,
        owner: &str,
        service: &str,
        event_type: &str,
    ) -> DomainResult<Vec<WebhookSubscription>>;

    async fn set_status(&self, id: Uuid, status: WebhookSubscriptionStatus) -> DomainResult<()>;

    /// Bump `event_count` and stamp `last_event_at` for one delivery.
    async fn record_event(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;
}
