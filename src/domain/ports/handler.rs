//! Reaction handler contract.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Typed failure raised by a reaction handler.
///
/// The dispatcher maps each variant to a different recovery policy:
/// invalid config fails the execution permanently, transient errors are
/// retried with backoff, and auth errors force a token refresh followed
/// by a single retry.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("auth: {0}")]
    Auth(String),
}

impl HandlerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Classify an upstream HTTP status the way the dispatcher expects:
    /// 429 and 5xx are transient, 401/403 are auth, other 4xx permanent.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => Self::Auth(detail),
            429 => Self::Transient(detail),
            s if s >= 500 => Self::Transient(detail),
            _ => Self::InvalidConfig(detail),
        }
    }
}

/// The code that performs a reaction's side effect.
///
/// Handlers are registered by name at process start and resolved by the
/// dispatcher per execution. They must be stateless across invocations;
/// everything they need arrives through the arguments.
#[async_trait]
pub trait ReactionHandler: Send + Sync {
    /// Catalog name this handler serves, e.g. `send_email`.
    fn name(&self) -> &'static str;

    /// Perform the side effect.
    ///
    /// `reaction_config` is the automation's validated reaction config,
    /// `trigger_data` the admitted trigger payload, and `owner` the stable
    /// id of the automation's owner (for token lookups).
    async fn handle(
        &self,
        reaction_config: &Value,
        trigger_data: &Value,
        owner: &str,
    ) -> Result<Value, HandlerError>;
}
