//! Webhook ingestion: match a validated inbound event to automations and
//! admit executions.
//!
//! Signature validation and payload parsing happen in the HTTP adapter;
//! this service receives the parsed event and applies catalog mapping,
//! per-automation config filters, and per-automation idempotency keys.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Automation, TriggerEvent};
use crate::domain::ports::{AutomationRepository, WebhookSubscriptionRepository};
use crate::services::admitter::ExecutionAdmitter;
use crate::services::catalog::Catalog;

/// Headers that must not be echoed into trigger data.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-hub-signature-256",
    "x-notion-signature",
    "twitch-eventsub-message-signature",
];

/// Processing result returned to the webhook caller.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub status: String,
    pub event_id: String,
    pub matched_automations: usize,
    pub executions_created: usize,
    pub executions_skipped: usize,
}

pub struct WebhookIngest {
    automations: Arc<dyn AutomationRepository>,
    subscriptions: Arc<dyn WebhookSubscriptionRepository>,
    admitter: Arc<ExecutionAdmitter>,
    catalog: &'static Catalog,
}

impl WebhookIngest {
    pub fn new(
        automations: Arc<dyn AutomationRepository>,
        subscriptions: Arc<dyn WebhookSubscriptionRepository>,
        admitter: Arc<ExecutionAdmitter>,
    ) -> Self {
        Self {
            automations,
            subscriptions,
            admitter,
            catalog: Catalog::builtin(),
        }
    }

    /// Process one validated webhook event.
    pub async fn process(
        &self,
        service: &str,
        event_type: &str,
        event_data: &Value,
        headers: &HashMap<String, String>,
        external_event_id: String,
    ) -> DomainResult<WebhookOutcome> {
        let mut outcome = WebhookOutcome {
            status: "success".to_string(),
            event_id: external_event_id.clone(),
            matched_automations: 0,
            executions_created: 0,
            executions_skipped: 0,
        };

        let Some(action_name) = self.catalog.action_for_webhook_event(service, event_type) else {
            tracing::debug!(service = service, event_type = event_type, "No action mapping for event");
            return Ok(outcome);
        };

        let candidates = self.automations.list_active_by_actions(&[action_name]).await?;
        let matched: Vec<&Automation> = candidates
            .iter()
            .filter(|a| matches_payload_filter(service, a, event_data))
            .collect();
        outcome.matched_automations = matched.len();

        if matched.is_empty() {
            tracing::info!(
                service = service,
                event_type = event_type,
                event_id = %external_event_id,
                "No automations matched webhook event"
            );
            return Ok(outcome);
        }

        let trigger_data = json!({
            "service": service,
            "event_type": event_type,
            "timestamp": Utc::now().to_rfc3339(),
            "event_data": event_data,
            "headers": sanitize_headers(headers),
        });

        for automation in &matched {
            // Sibling executions per automation for the same upstream
            // event, each idempotent on its own key.
            let key = format!("{external_event_id}_automation_{}", automation.id);
            let event = TriggerEvent::new(automation.id, key, trigger_data.clone());
            match self.admitter.admit(event).await {
                Ok((_, true)) => outcome.executions_created += 1,
                Ok((_, false)) => outcome.executions_skipped += 1,
                Err(e) => {
                    tracing::error!(
                        automation_id = %automation.id,
                        error = %e,
                        "Failed to admit webhook execution"
                    );
                }
            }
        }

        self.record_subscription_events(service, event_type, &matched).await;

        Ok(outcome)
    }

    /// Bump delivery counters on the subscriptions that fed this event.
    async fn record_subscription_events(
        &self,
        service: &str,
        event_type: &str,
        matched: &[&Automation],
    ) {
        let now = Utc::now();
        let mut seen_owners: Vec<&str> = Vec::new();
        for automation in matched {
            if seen_owners.contains(&automation.owner.as_str()) {
                continue;
            }
            seen_owners.push(automation.owner.as_str());
            match self
                .subscriptions
                .list_active_by_event(&automation.owner, service, event_type)
                .await
            {
                Ok(subs) => {
                    for sub in subs {
                        if let Err(e) = self.subscriptions.record_event(sub.id, now).await {
                            tracing::debug!(error = %e, "Failed to record subscription event");
                        }
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Subscription lookup failed"),
            }
        }
    }
}

/// Whether an automation's action config accepts this payload.
///
/// Each service filters on its own dimension; a missing config key means
/// no filtering.
pub fn matches_payload_filter(service: &str, automation: &Automation, payload: &Value) -> bool {
    match service {
        "github" => match automation.action_config_str("repository") {
            Some(want) => payload
                .pointer("/repository/full_name")
                .and_then(Value::as_str)
                .is_some_and(|got| got.eq_ignore_ascii_case(want)),
            None => true,
        },
        "notion" => match automation.action_config_str("page_id") {
            Some(want) => payload
                .pointer("/data/id")
                .and_then(Value::as_str)
                .is_some_and(|got| got == want),
            None => true,
        },
        "twitch" => match automation.action_config_str("broadcaster_user_id") {
            Some(want) => payload
                .pointer("/event/broadcaster_user_id")
                .and_then(Value::as_str)
                .is_some_and(|got| got == want),
            None => true,
        },
        "gmail" => {
            let from_ok = match automation.action_config_str("from_email") {
                Some(want) => payload
                    .get("from")
                    .and_then(Value::as_str)
                    .is_some_and(|got| got.eq_ignore_ascii_case(want)),
                None => true,
            };
            let subject_ok = match automation.action_config_str("subject_contains") {
                Some(want) => payload
                    .get("subject")
                    .and_then(Value::as_str)
                    .is_some_and(|got| got.contains(want)),
                None => true,
            };
            from_ok && subject_ok
        }
        _ => true,
    }
}

fn sanitize_headers(headers: &HashMap<String, String>) -> Value {
    let map: serde_json::Map<String, Value> = headers
        .iter()
        .filter(|(k, _)| !SENSITIVE_HEADERS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn github_automation(repo: Option<&str>) -> Automation {
        let mut automation = Automation::new("u", "A", "github_push", "log_message");
        if let Some(repo) = repo {
            automation = automation.with_action_config(json!({"repository": repo}));
        }
        automation
    }

    #[test]
    fn test_github_repo_filter() {
        let payload = json!({"repository": {"full_name": "octo/site"}});
        assert!(matches_payload_filter("github", &github_automation(Some("octo/site")), &payload));
        assert!(matches_payload_filter("github", &github_automation(Some("OCTO/site")), &payload));
        assert!(!matches_payload_filter("github", &github_automation(Some("octo/other")), &payload));
        assert!(matches_payload_filter("github", &github_automation(None), &payload));
    }

    #[test]
    fn test_github_filter_with_missing_payload_dimension() {
        let payload = json!({"zen": "Keep it logically awesome."});
        assert!(!matches_payload_filter("github", &github_automation(Some("octo/site")), &payload));
        assert!(matches_payload_filter("github", &github_automation(None), &payload));
    }

    #[test]
    fn test_twitch_broadcaster_filter() {
        let automation = Automation::new("u", "A", "twitch_stream_online", "log_message")
            .with_action_config(json!({"broadcaster_user_id": "1234"}));
        let hit = json!({"event": {"broadcaster_user_id": "1234"}});
        let miss = json!({"event": {"broadcaster_user_id": "9999"}});
        assert!(matches_payload_filter("twitch", &automation, &hit));
        assert!(!matches_payload_filter("twitch", &automation, &miss));
    }

    #[test]
    fn test_gmail_subject_filter() {
        let automation = Automation::new("u", "A", "gmail_received", "log_message")
            .with_action_config(json!({"subject_contains": "invoice"}));
        assert!(matches_payload_filter(
            "gmail",
            &automation,
            &json!({"subject": "Your invoice for March"})
        ));
        assert!(!matches_payload_filter(
            "gmail",
            &automation,
            &json!({"subject": "Team lunch"})
        ));
    }

    #[test]
    fn test_sanitize_headers_drops_signatures() {
        let mut headers = HashMap::new();
        headers.insert("X-Hub-Signature-256".to_string(), "sha256=abc".to_string());
        headers.insert("Authorization".to_string(), "Bearer t".to_string());
        headers.insert("X-GitHub-Event".to_string(), "push".to_string());

        let sanitized = sanitize_headers(&headers);
        let obj = sanitized.as_object().unwrap();
        assert!(obj.contains_key("X-GitHub-Event"));
        assert!(!obj.contains_key("X-Hub-Signature-256"));
        assert!(!obj.contains_key("Authorization"));
    }
}
