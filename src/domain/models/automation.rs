//! Automation domain model.
//!
//! An automation pairs an action (trigger) with a reaction (effect) plus
//! per-side configuration. The engine only reads automations; they are
//! written by the management surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    /// Eligible for triggering.
    Active,
    /// Turned off by the user.
    Disabled,
    /// Temporarily suspended; keeps its state.
    Paused,
}

impl Default for AutomationStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl AutomationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Paused => "paused",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "disabled" => Some(Self::Disabled),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// A user-defined pairing of an action with a reaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: Uuid,
    /// Owning user, by stable identifier.
    pub owner: String,
    pub display_name: String,
    /// Catalog action name, e.g. `timer_daily` or `github_new_issue`.
    pub action_name: String,
    pub action_config: Value,
    /// Catalog reaction name, e.g. `send_email`.
    pub reaction_name: String,
    pub reaction_config: Value,
    pub status: AutomationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    pub fn new(
        owner: impl Into<String>,
        display_name: impl Into<String>,
        action_name: impl Into<String>,
        reaction_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            display_name: display_name.into(),
            action_name: action_name.into(),
            action_config: Value::Object(Default::default()),
            reaction_name: reaction_name.into(),
            reaction_config: Value::Object(Default::default()),
            status: AutomationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_action_config(mut self, config: Value) -> Self {
        self.action_config = config;
        self
    }

    pub fn with_reaction_config(mut self, config: Value) -> Self {
        self.reaction_config = config;
        self
    }

    pub fn with_status(mut self, status: AutomationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AutomationStatus::Active
    }

    /// Read a string key from the action config.
    pub fn action_config_str(&self, key: &str) -> Option<&str> {
        self.action_config.get(key).and_then(Value::as_str)
    }

    /// Read an integer key from the action config.
    pub fn action_config_i64(&self, key: &str) -> Option<i64> {
        self.action_config.get(key).and_then(Value::as_i64)
    }
}

/// Poll cursor owned by the poller that serves an automation.
///
/// One-to-one with its automation; created lazily on first poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionState {
    pub automation_id: Uuid,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
    pub metadata: Value,
    pub updated_at: DateTime<Utc>,
}

impl ActionState {
    pub fn new(automation_id: Uuid) -> Self {
        Self {
            automation_id,
            last_checked_at: None,
            last_event_id: None,
            metadata: Value::Object(Default::default()),
            updated_at: Utc::now(),
        }
    }

    /// Record a completed poll cycle.
    pub fn mark_checked(&mut self, at: DateTime<Utc>, newest_event_id: Option<String>) {
        self.last_checked_at = Some(at);
        if newest_event_id.is_some() {
            self.last_event_id = newest_event_id;
        }
        self.updated_at = at;
    }
}
