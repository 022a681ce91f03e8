//! Execution admitter.
//!
//! Single entry point for materialising a trigger event into an
//! execution. Admission atomically either inserts a new pending row and
//! schedules it on the dispatch queue, or observes the uniqueness
//! conflict and does nothing. The at-most-once-per-event guarantee is
//! the database constraint, not application logic.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Execution, TriggerEvent};
use crate::domain::ports::ExecutionRepository;
use crate::services::dispatcher::DispatchQueue;

pub struct ExecutionAdmitter {
    executions: Arc<dyn ExecutionRepository>,
    queue: DispatchQueue,
}

impl ExecutionAdmitter {
    pub fn new(executions: Arc<dyn ExecutionRepository>, queue: DispatchQueue) -> Self {
        Self { executions, queue }
    }

    /// Admit a trigger event.
    ///
    /// Returns `(Some(execution), true)` when a new execution was created
    /// and queued, `(None, false)` when an execution with the same
    /// `(automation_id, external_event_id)` already exists.
    pub async fn admit(&self, event: TriggerEvent) -> DomainResult<(Option<Execution>, bool)> {
        let execution = Execution::new(
            event.automation_id,
            event.external_event_id,
            event.trigger_data,
        );

        match self.executions.insert(&execution).await {
            Ok(()) => {
                tracing::info!(
                    execution_id = %execution.id,
                    automation_id = %execution.automation_id,
                    external_event_id = %execution.external_event_id,
                    "Admitted execution"
                );
                if !self.queue.enqueue(execution.id).await {
                    // The row stays pending; the backlog scan picks it up.
                    tracing::warn!(
                        execution_id = %execution.id,
                        "Dispatch queue closed, execution left pending"
                    );
                }
                Ok((Some(execution), true))
            }
            Err(DomainError::UniquenessConflict { automation_id, external_event_id }) => {
                tracing::debug!(
                    automation_id = %automation_id,
                    external_event_id = %external_event_id,
                    "Duplicate trigger event, skipping"
                );
                Ok((None, false))
            }
            Err(e) => Err(e),
        }
    }
}
