//! Webhook subscription domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of an upstream webhook subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookSubscriptionStatus {
    Active,
    Revoked,
    Failed,
}

impl WebhookSubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A push channel registered with an upstream service.
///
/// Auto-created when an automation's action supports webhook delivery;
/// revoked when the last dependent automation is removed. While an active
/// subscription covers an action, the poller skips it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub owner: String,
    pub service: String,
    /// Upstream's identifier for the subscription, when registration
    /// succeeded.
    pub external_subscription_id: Option<String>,
    pub event_type: String,
    pub config: Value,
    pub status: WebhookSubscriptionStatus,
    pub event_count: i64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn new(
        owner: impl Into<String>,
        service: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            service: service.into(),
            external_subscription_id: None,
            event_type: event_type.into(),
            config: Value::Object(Default::default()),
            status: WebhookSubscriptionStatus::Active,
            event_count: 0,
            last_event_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_subscription_id = Some(id.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == WebhookSubscriptionStatus::Active
    }

    /// Record one delivered event.
    pub fn record_event(&mut self, at: DateTime<Utc>) {
        self.event_count += 1;
        self.last_event_at = Some(at);
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_event_increments() {
        let mut sub = WebhookSubscription::new("u", "github", "issues");
        assert_eq!(sub.event_count, 0);
        let t = Utc::now();
        sub.record_event(t);
        sub.record_event(t);
        assert_eq!(sub.event_count, 2);
        assert_eq!(sub.last_event_at, Some(t));
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            WebhookSubscriptionStatus::Active,
            WebhookSubscriptionStatus::Revoked,
            WebhookSubscriptionStatus::Failed,
        ] {
            assert_eq!(WebhookSubscriptionStatus::from_str(s.as_str()), Some(s));
        }
    }
}
