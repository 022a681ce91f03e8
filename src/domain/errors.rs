//! Domain errors for the relay engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors shared across ports and services.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Automation not found: {0}")]
    AutomationNotFound(Uuid),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("Service not found or inactive: {0}")]
    ServiceNotFound(String),

    #[error("No token for owner {owner} and service {service}")]
    TokenNotFound { owner: String, service: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("An execution for (automation {automation_id}, event {external_event_id}) already exists")]
    UniquenessConflict {
        automation_id: Uuid,
        external_event_id: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Upstream call failed: {0}")]
    UpstreamFailed(String),

    #[error("Upstream rejected credentials: {0}")]
    UpstreamUnauthorized(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether a retry of the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DatabaseError(_) | Self::UpstreamFailed(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
