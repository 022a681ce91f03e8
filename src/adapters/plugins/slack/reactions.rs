//! `slack_send_message` reaction via `chat.postMessage`.
//!
//! Slack reports most failures as HTTP 200 with `ok: false`, so the
//! error string, not the status code, drives classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{HandlerError, ReactionHandler};
use crate::services::token_broker::TokenBroker;

const SLACK_API_BASE: &str = "https://slack.com";

pub struct SlackSendMessageHandler {
    http: reqwest::Client,
    broker: Arc<TokenBroker>,
    base_url: String,
}

impl SlackSendMessageHandler {
    pub fn new(broker: Arc<TokenBroker>) -> Self {
        Self::with_base_url(broker, SLACK_API_BASE)
    }

    pub fn with_base_url(broker: Arc<TokenBroker>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            broker,
            base_url: base_url.into(),
        }
    }

    fn classify_slack_error(error: &str) -> HandlerError {
        match error {
            "invalid_auth" | "token_revoked" | "token_expired" | "not_authed" => {
                HandlerError::Auth(format!("Slack rejected token: {error}"))
            }
            "ratelimited" | "service_unavailable" | "internal_error" => {
                HandlerError::Transient(format!("Slack transient failure: {error}"))
            }
            other => HandlerError::InvalidConfig(format!("Slack rejected message: {other}")),
        }
    }
}

#[async_trait]
impl ReactionHandler for SlackSendMessageHandler {
    fn name(&self) -> &'static str {
        "slack_send_message"
    }

    async fn handle(
        &self,
        reaction_config: &Value,
        _trigger_data: &Value,
        owner: &str,
    ) -> Result<Value, HandlerError> {
        let channel = reaction_config
            .get("channel")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidConfig("missing 'channel'".to_string()))?;
        let text = reaction_config
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidConfig("missing 'text'".to_string()))?;

        let token = match self.broker.get_valid_token(owner, "slack").await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(HandlerError::Auth("no valid Slack token".to_string())),
            Err(e) => return Err(HandlerError::Transient(e.to_string())),
        };

        let url = format!("{}/api/chat.postMessage", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({"channel": channel, "text": text}))
            .send()
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let detail = resp.text().await.unwrap_or_default();
            return Err(HandlerError::from_status(
                status,
                format!("Slack returned {status}: {detail}"),
            ));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
            return Err(Self::classify_slack_error(error));
        }

        if let Err(e) = self.broker.mark_used(owner, "slack").await {
            tracing::debug!(error = %e, "Failed to stamp token usage");
        }

        Ok(json!({
            "channel": channel,
            "ts": body.get("ts").cloned().unwrap_or(Value::Null),
        }))
    }
}
