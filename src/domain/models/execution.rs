//! Execution domain model.
//!
//! An execution is the persistent record of a single attempt to run the
//! reaction for a single logical event. `(automation_id,
//! external_event_id)` is the idempotency key, enforced by a database
//! constraint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Status of an execution in the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Admitted, waiting for a dispatch worker.
    Pending,
    /// A worker is running the reaction.
    Running,
    /// Reaction completed.
    Success,
    /// Reaction failed permanently or exhausted its retry budget.
    Failed,
    /// Terminal marker for events deduplicated at admission.
    Skipped,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }

    /// Valid transitions from this status.
    ///
    /// Statuses move monotonically along pending → running → (success |
    /// failed). A retry re-queues the task but the row stays `running`
    /// until the next attempt resolves it, so there is no backward edge.
    pub fn valid_transitions(&self) -> &'static [ExecutionStatus] {
        match self {
            Self::Pending => &[Self::Running],
            Self::Running => &[Self::Success, Self::Failed, Self::Pending],
            Self::Success => &[],
            Self::Failed => &[],
            Self::Skipped => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// A persistent record of one reaction run for one logical event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub automation_id: Uuid,
    /// Deterministic id of the logical event; unique per automation.
    pub external_event_id: String,
    pub status: ExecutionStatus,
    /// Inputs visible to the reaction handler; written verbatim at admission.
    pub trigger_data: Value,
    pub result_data: Option<Value>,
    pub error_message: Option<String>,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(automation_id: Uuid, external_event_id: impl Into<String>, trigger_data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            automation_id,
            external_event_id: external_event_id.into(),
            status: ExecutionStatus::Pending,
            trigger_data,
            result_data: None,
            error_message: None,
            attempt_count: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to a new status, updating timestamps.
    pub fn transition_to(&mut self, new_status: ExecutionStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        match new_status {
            ExecutionStatus::Running => self.started_at = Some(Utc::now()),
            ExecutionStatus::Success | ExecutionStatus::Failed => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }

        Ok(())
    }

    /// Begin an attempt: pending → running with the attempt counter bumped.
    pub fn begin_attempt(&mut self) -> DomainResult<()> {
        self.transition_to(ExecutionStatus::Running)?;
        self.attempt_count += 1;
        Ok(())
    }

    /// Finish successfully, storing the handler's result.
    pub fn complete(&mut self, result_data: Value) -> DomainResult<()> {
        self.transition_to(ExecutionStatus::Success)?;
        self.result_data = Some(result_data);
        Ok(())
    }

    /// Finish permanently failed with an error message.
    pub fn fail(&mut self, error_message: impl Into<String>) -> DomainResult<()> {
        self.transition_to(ExecutionStatus::Failed)?;
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// Return a running execution to the queue for a later attempt.
    ///
    /// Used by the retry path and by the boot-time reclaim sweep.
    pub fn requeue(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        self.transition_to(ExecutionStatus::Pending)?;
        self.error_message = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Execution {
        Execution::new(Uuid::new_v4(), "evt-1", json!({"k": "v"}))
    }

    #[test]
    fn test_new_execution_is_pending() {
        let exec = sample();
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert_eq!(exec.attempt_count, 0);
        assert!(exec.started_at.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut exec = sample();
        exec.begin_attempt().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert_eq!(exec.attempt_count, 1);
        assert!(exec.started_at.is_some());

        exec.complete(json!({"sent": true})).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert!(exec.completed_at.is_some());
        assert!(exec.is_terminal());
    }

    #[test]
    fn test_failure_path() {
        let mut exec = sample();
        exec.begin_attempt().unwrap();
        exec.fail("boom").unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn test_requeue_from_running() {
        let mut exec = sample();
        exec.begin_attempt().unwrap();
        exec.requeue("transient: timeout").unwrap();
        assert_eq!(exec.status, ExecutionStatus::Pending);

        // A second attempt bumps the counter again.
        exec.begin_attempt().unwrap();
        assert_eq!(exec.attempt_count, 2);
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        let mut exec = sample();
        exec.begin_attempt().unwrap();
        exec.complete(json!({})).unwrap();

        assert!(exec.transition_to(ExecutionStatus::Running).is_err());
        assert!(exec.transition_to(ExecutionStatus::Pending).is_err());
        assert!(exec.transition_to(ExecutionStatus::Failed).is_err());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut exec = sample();
        assert!(exec.complete(json!({})).is_err());
        assert!(exec.fail("nope").is_err());
    }

    #[test]
    fn test_skipped_has_no_outbound_edges() {
        assert!(ExecutionStatus::Skipped.valid_transitions().is_empty());
        assert!(ExecutionStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Skipped,
        ] {
            assert_eq!(ExecutionStatus::from_str(s.as_str()), Some(s));
        }
    }
}
