//! `send_email` reaction via the Gmail API.
//!
//! Sends from the automation owner's own mailbox using their OAuth
//! token. The message is assembled as RFC 2822 and submitted through
//! `users/me/messages/send` as a base64url `raw` payload.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

use crate::domain::ports::{HandlerError, ReactionHandler};
use crate::services::token_broker::TokenBroker;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

pub struct SendEmailHandler {
    http: reqwest::Client,
    broker: Arc<TokenBroker>,
    base_url: String,
}

impl SendEmailHandler {
    pub fn new(broker: Arc<TokenBroker>) -> Self {
        Self::with_base_url(broker, GMAIL_API_BASE)
    }

    pub fn with_base_url(broker: Arc<TokenBroker>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            broker,
            base_url: base_url.into(),
        }
    }

    /// Assemble the RFC 2822 message and encode it for the API.
    fn encode_message(recipient: &str, subject: &str, body: &str) -> String {
        let message = format!(
            "To: {recipient}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}"
        );
        URL_SAFE_NO_PAD.encode(message.as_bytes())
    }
}

#[async_trait]
impl ReactionHandler for SendEmailHandler {
    fn name(&self) -> &'static str {
        "send_email"
    }

    async fn handle(
        &self,
        reaction_config: &Value,
        _trigger_data: &Value,
        owner: &str,
    ) -> Result<Value, HandlerError> {
        let recipient = reaction_config
            .get("recipient")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidConfig("missing 'recipient'".to_string()))?;
        let subject = reaction_config
            .get("subject")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidConfig("missing 'subject'".to_string()))?;
        let body = reaction_config
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidConfig("missing 'body'".to_string()))?;

        let token = match self.broker.get_valid_token(owner, "gmail").await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(HandlerError::Auth("no valid Gmail token".to_string())),
            Err(e) => return Err(HandlerError::Transient(e.to_string())),
        };

        let raw = Self::encode_message(recipient, subject, body);
        let url = format!("{}/gmail/v1/users/me/messages/send", self.base_url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({"raw": raw}))
            .send()
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let detail = resp.text().await.unwrap_or_default();
            return Err(HandlerError::from_status(
                status,
                format!("Gmail send returned {status}: {detail}"),
            ));
        }

        let sent: Value = resp
            .json()
            .await
            .map_err(|e| HandlerError::Transient(e.to_string()))?;

        if let Err(e) = self.broker.mark_used(owner, "gmail").await {
            tracing::debug!(error = %e, "Failed to stamp token usage");
        }

        tracing::info!(recipient = recipient, "Sent email");
        Ok(json!({
            "message_id": sent.get("id").cloned().unwrap_or(Value::Null),
            "recipient": recipient,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_message_is_base64url() {
        let raw = SendEmailHandler::encode_message("u@x.io", "Hi", "Hello");
        let decoded = URL_SAFE_NO_PAD.decode(&raw).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.starts_with("To: u@x.io\r\n"));
        assert!(text.contains("Subject: Hi\r\n"));
        assert!(text.ends_with("\r\n\r\nHello"));
        // base64url alphabet only.
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert!(!raw.contains('='));
    }
}
