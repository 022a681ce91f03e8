//! Notion webhook registrar.
//!
//! Notion supports push delivery; when a user creates a page-watching
//! automation the engine registers a webhook upstream so the poller can
//! stand down.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Automation;
use crate::domain::ports::WebhookRegistrar;

const NOTION_API_BASE: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

pub struct NotionWebhookRegistrar {
    http: reqwest::Client,
    base_url: String,
    /// Public URL of this engine's webhook endpoint, e.g.
    /// `https://relay.example.com/webhooks/notion`.
    callback_url: String,
}

impl NotionWebhookRegistrar {
    pub fn new(callback_url: impl Into<String>) -> Self {
        Self::with_base_url(callback_url, NOTION_API_BASE)
    }

    pub fn with_base_url(callback_url: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            callback_url: callback_url.into(),
        }
    }
}

#[async_trait]
impl WebhookRegistrar for NotionWebhookRegistrar {
    fn service(&self) -> &'static str {
        "notion"
    }

    fn event_type_for(&self, automation: &Automation) -> Option<String> {
        match automation.action_name.as_str() {
            "notion_page_updated" => Some("page".to_string()),
            _ => None,
        }
    }

    fn watched_config_keys(&self) -> &'static [&'static str] {
        &["page_id"]
    }

    async fn register(&self, automation: &Automation, access_token: &str) -> DomainResult<String> {
        let url = format!("{}/v1/webhooks", self.base_url);
        let mut payload = json!({
            "url": self.callback_url,
            "event_types": ["page.content_updated", "page.properties_updated"],
        });
        if let Some(page_id) = automation.action_config_str("page_id") {
            payload["filter"] = json!({"page_id": page_id});
        }

        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::UpstreamFailed(format!("notion webhook create failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            if status == 401 || status == 403 {
                return Err(DomainError::UpstreamUnauthorized(body));
            }
            return Err(DomainError::UpstreamFailed(format!(
                "notion webhook create returned {status}: {body}"
            )));
        }

        let created: Value = resp
            .json()
            .await
            .map_err(|e| DomainError::UpstreamFailed(format!("notion response parse failed: {e}")))?;

        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::UpstreamFailed("notion webhook response missing id".to_string())
            })
    }

    async fn revoke(&self, external_subscription_id: &str, access_token: &str) -> DomainResult<()> {
        let url = format!("{}/v1/webhooks/{}", self.base_url, external_subscription_id);

        let resp = self
            .http
            .delete(&url)
            .bearer_auth(access_token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| DomainError::UpstreamFailed(format!("notion webhook delete failed: {e}")))?;

        // A webhook already gone upstream counts as revoked.
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::UpstreamFailed(format!(
                "notion webhook delete returned {status}: {body}"
            )));
        }

        Ok(())
    }
}
