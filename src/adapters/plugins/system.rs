//! Engine-internal reactions.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{HandlerError, ReactionHandler};

/// `log_message`: write the configured message to the engine log.
///
/// The simplest possible reaction; used for smoke-testing automations
/// end to end without any external service.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageHandler;

#[async_trait]
impl ReactionHandler for LogMessageHandler {
    fn name(&self) -> &'static str {
        "log_message"
    }

    async fn handle(
        &self,
        reaction_config: &Value,
        trigger_data: &Value,
        owner: &str,
    ) -> Result<Value, HandlerError> {
        let message = reaction_config
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidConfig("missing 'message'".to_string()))?;

        tracing::info!(
            owner = owner,
            message = message,
            trigger_service = trigger_data.get("service").and_then(|v| v.as_str()),
            "log_message reaction"
        );

        Ok(json!({"logged": true, "message": message}))
    }
}
