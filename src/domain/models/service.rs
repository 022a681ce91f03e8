//! Service, action, and reaction catalog types.
//!
//! A [`Service`] is an external system (github, gmail, ...). Each service
//! exposes actions (triggers) and reactions (effects). Action and reaction
//! definitions are immutable catalog entries built at process start; the
//! `services` table only tracks availability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::ConfigSchema;

/// Availability of an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Active,
    Inactive,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// An external service the engine can talk to.
///
/// Inactive services are never selected by pollers or dispatchers, and
/// their webhook endpoints reject deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub description: String,
    pub status: ServiceStatus,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: ServiceStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }
}

/// How a given action's trigger events reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerChannel {
    /// Fired by the minute-boundary timer scheduler.
    Timer,
    /// Discovered by a per-service poller.
    Poll,
    /// Delivered by an inbound webhook.
    Webhook,
}

/// Catalog definition of an action (trigger).
///
/// `(service, name)` is unique across the catalog; in practice action
/// names are globally unique (`github_new_issue`, `timer_daily`, ...).
#[derive(Debug, Clone)]
pub struct ActionDef {
    pub service: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub channel: TriggerChannel,
    pub schema: ConfigSchema,
}

/// Catalog definition of a reaction (effect).
#[derive(Debug, Clone)]
pub struct ReactionDef {
    pub service: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ConfigSchema,
}
