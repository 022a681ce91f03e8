//! The uniform internal trigger event.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A uniform representation of an upstream signal, produced by the timer
/// scheduler, a poller, or a webhook receiver.
///
/// `external_event_id` is deterministic over logical events: every
/// producer derives it from stable upstream identifiers so that replays
/// collapse onto the same execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub automation_id: Uuid,
    pub external_event_id: String,
    pub trigger_data: Value,
}

impl TriggerEvent {
    pub fn new(automation_id: Uuid, external_event_id: impl Into<String>, trigger_data: Value) -> Self {
        Self {
            automation_id,
            external_event_id: external_event_id.into(),
            trigger_data,
        }
    }
}
