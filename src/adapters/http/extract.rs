//! Event type and event id extraction from webhook deliveries.
//!
//! Event ids are derived from the most stable upstream identifier
//! available, in priority order: a provider-supplied delivery id, an
//! object id (optionally with timestamp), a commit SHA or message id,
//! and finally a content hash. Header keys are expected lowercased.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Determine the event type of a delivery.
pub fn extract_event_type(
    service: &str,
    headers: &HashMap<String, String>,
    payload: &Value,
) -> String {
    match service {
        "github" => headers
            .get("x-github-event")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        "gmail" => payload
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or("message")
            .to_string(),
        "notion" => payload
            .pointer("/data/object")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        "twitch" => payload
            .pointer("/subscription/type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        _ => payload
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
    }
}

/// Derive the deterministic external event id for a delivery.
pub fn extract_event_id(
    service: &str,
    headers: &HashMap<String, String>,
    payload: &Value,
    raw_body: &[u8],
) -> String {
    match service {
        "github" => {
            if let Some(delivery) = headers
                .get("x-github-delivery")
                .map(String::as_str)
                .or_else(|| payload.get("delivery").and_then(Value::as_str))
            {
                return format!("github_delivery_{delivery}");
            }
            if let Some(hook_id) = payload.get("hook_id").and_then(value_as_id) {
                return format!("github_delivery_{hook_id}");
            }
            if let Some(sha) = payload
                .pointer("/commits/0/id")
                .and_then(Value::as_str)
            {
                return format!("github_push_{sha}");
            }
            if let Some(id) = payload.pointer("/pull_request/id").and_then(value_as_id) {
                return format!("github_pr_{id}");
            }
            if let Some(id) = payload.pointer("/issue/id").and_then(value_as_id) {
                return format!("github_issue_{id}");
            }
        }
        "gmail" => {
            if let Some(id) = payload.pointer("/message/messageId").and_then(value_as_id) {
                return format!("gmail_message_{id}");
            }
        }
        "notion" => {
            let object_id = payload.pointer("/data/id").and_then(Value::as_str);
            let timestamp = payload.get("timestamp").and_then(Value::as_str);
            match (object_id, timestamp) {
                (Some(id), Some(ts)) => return format!("notion_{id}_{ts}"),
                (Some(id), None) => return format!("notion_{id}"),
                _ => {}
            }
        }
        "twitch" => {
            if let Some(id) = headers.get("twitch-eventsub-message-id") {
                return format!("twitch_message_{id}");
            }
        }
        _ => {}
    }

    fallback_event_id(service, raw_body)
}

/// Content-addressed fallback when no stable upstream id is available.
fn fallback_event_id(service: &str, raw_body: &[u8]) -> String {
    let digest = Sha256::digest(raw_body);
    let short = hex::encode(&digest[..8]);
    format!("{service}_{}_{short}", Utc::now().to_rfc3339())
}

/// Upstream ids arrive as either numbers or strings.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_headers() -> HashMap<String, String> {
        HashMap::new()
    }

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    // ── event type ──────────────────────────────────────────────────────────

    #[test]
    fn test_github_event_type_from_header() {
        let h = headers(&[("x-github-event", "push")]);
        assert_eq!(extract_event_type("github", &h, &json!({})), "push");
        assert_eq!(extract_event_type("github", &no_headers(), &json!({})), "unknown");
    }

    #[test]
    fn test_gmail_event_type_from_payload() {
        assert_eq!(
            extract_event_type("gmail", &no_headers(), &json!({"eventType": "email_received"})),
            "email_received"
        );
        assert_eq!(extract_event_type("gmail", &no_headers(), &json!({})), "message");
    }

    #[test]
    fn test_notion_event_type_from_object() {
        let payload = json!({"data": {"object": "page"}});
        assert_eq!(extract_event_type("notion", &no_headers(), &payload), "page");
    }

    #[test]
    fn test_twitch_event_type_from_subscription() {
        let payload = json!({"subscription": {"type": "stream.online"}});
        assert_eq!(extract_event_type("twitch", &no_headers(), &payload), "stream.online");
    }

    #[test]
    fn test_generic_event_type() {
        assert_eq!(
            extract_event_type("other", &no_headers(), &json!({"event_type": "thing"})),
            "thing"
        );
    }

    // ── event id ────────────────────────────────────────────────────────────

    #[test]
    fn test_github_delivery_id_takes_priority() {
        let payload = json!({"delivery": "abc", "commits": [{"id": "sha1"}]});
        assert_eq!(
            extract_event_id("github", &no_headers(), &payload, b"{}"),
            "github_delivery_abc"
        );
        // Header wins over payload.
        let h = headers(&[("x-github-delivery", "hdr-1")]);
        assert_eq!(
            extract_event_id("github", &h, &payload, b"{}"),
            "github_delivery_hdr-1"
        );
    }

    #[test]
    fn test_github_falls_back_to_commit_sha() {
        let payload = json!({"commits": [{"id": "sha1"}]});
        assert_eq!(
            extract_event_id("github", &no_headers(), &payload, b"{}"),
            "github_push_sha1"
        );
    }

    #[test]
    fn test_github_pr_and_issue_ids() {
        let pr = json!({"pull_request": {"id": 991}});
        assert_eq!(extract_event_id("github", &no_headers(), &pr, b"{}"), "github_pr_991");
        let issue = json!({"issue": {"id": 17}});
        assert_eq!(extract_event_id("github", &no_headers(), &issue, b"{}"), "github_issue_17");
    }

    #[test]
    fn test_gmail_message_id() {
        let payload = json!({"message": {"messageId": "m-42"}});
        assert_eq!(
            extract_event_id("gmail", &no_headers(), &payload, b"{}"),
            "gmail_message_m-42"
        );
    }

    #[test]
    fn test_notion_object_and_timestamp() {
        let payload = json!({"timestamp": "t1", "data": {"id": "p1"}});
        assert_eq!(
            extract_event_id("notion", &no_headers(), &payload, b"{}"),
            "notion_p1_t1"
        );
        let no_ts = json!({"data": {"id": "p1"}});
        assert_eq!(
            extract_event_id("notion", &no_headers(), &no_ts, b"{}"),
            "notion_p1"
        );
    }

    #[test]
    fn test_fallback_is_deterministic_prefix() {
        let id = extract_event_id("github", &no_headers(), &json!({}), b"body");
        assert!(id.starts_with("github_"));
        // The content hash suffix is stable for the same body.
        let suffix = id.rsplit('_').next().unwrap().to_string();
        let id2 = extract_event_id("github", &no_headers(), &json!({}), b"body");
        assert!(id2.ends_with(&suffix));
    }
}
