//! Built-in service catalog.
//!
//! The catalog is the process-level registry of services, actions, and
//! reactions the engine ships with, including per-side config schemas,
//! the webhook `(service, event type) → action` mapping, and the
//! action/reaction compatibility rule set. It is built once at boot and
//! never mutated.

use std::sync::OnceLock;

use crate::domain::models::{
    ActionDef, Automation, ConfigSchema, FieldShape, FieldSpec, FieldType, ReactionDef,
    TriggerChannel,
};

const TIMER_DAILY_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("hour", FieldType::Integer).with_range(0, 23),
    FieldSpec::required("minute", FieldType::Integer).with_range(0, 59),
]);

const TIMER_WEEKLY_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("day_of_week", FieldType::Integer).with_range(0, 6),
    FieldSpec::required("hour", FieldType::Integer).with_range(0, 23),
    FieldSpec::required("minute", FieldType::Integer).with_range(0, 59),
]);

const GITHUB_REPO_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("repository", FieldType::String).with_shape(FieldShape::RepoFullName),
    FieldSpec::optional("labels", FieldType::StringList),
]);

const GITHUB_WEBHOOK_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::optional("repository", FieldType::String).with_shape(FieldShape::RepoFullName),
]);

const GMAIL_RECEIVED_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::optional("from_email", FieldType::String).with_shape(FieldShape::Email),
    FieldSpec::optional("subject_contains", FieldType::String),
]);

const NOTION_PAGE_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::optional("page_id", FieldType::String),
]);

const TWITCH_BROADCASTER_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::optional("broadcaster_user_id", FieldType::String),
]);

const SEND_EMAIL_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("recipient", FieldType::String).with_shape(FieldShape::Email),
    FieldSpec::required("subject", FieldType::String),
    FieldSpec::required("body", FieldType::String),
]);

const GITHUB_CREATE_ISSUE_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("repository", FieldType::String).with_shape(FieldShape::RepoFullName),
    FieldSpec::required("title", FieldType::String),
    FieldSpec::optional("body", FieldType::String),
    FieldSpec::optional("labels", FieldType::StringList),
]);

const GITHUB_POST_COMMENT_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("repository", FieldType::String).with_shape(FieldShape::RepoFullName),
    FieldSpec::optional("issue_number", FieldType::Integer),
    FieldSpec::required("body", FieldType::String),
]);

const SLACK_MESSAGE_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("channel", FieldType::String),
    FieldSpec::required("text", FieldType::String),
]);

const LOG_MESSAGE_SCHEMA: ConfigSchema = ConfigSchema::new(&[
    FieldSpec::required("message", FieldType::String),
]);

/// One entry of the webhook event mapping table.
#[derive(Debug, Clone, Copy)]
pub struct WebhookEventMapping {
    pub service: &'static str,
    pub event_type: &'static str,
    pub action_name: &'static str,
}

/// A service shipped with the engine.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDef {
    pub name: &'static str,
    pub description: &'static str,
}

/// Action/reaction pairs that must not be combined. Pairing a repository
/// trigger with an issue-creating reaction on the same service can feed
/// the engine its own output.
const INCOMPATIBLE_PAIRS: &[(&str, &str)] = &[
    ("github_new_issue", "github_create_issue"),
    ("github_issue", "github_create_issue"),
];

/// The process-level catalog.
pub struct Catalog {
    services: Vec<ServiceDef>,
    actions: Vec<ActionDef>,
    reactions: Vec<ReactionDef>,
    webhook_events: Vec<WebhookEventMapping>,
}

impl Catalog {
    /// The built-in catalog, constructed once per process.
    pub fn builtin() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Self::build)
    }

    fn build() -> Catalog {
        let services = vec![
            ServiceDef { name: "timer", description: "Time-based triggers" },
            ServiceDef { name: "github", description: "GitHub repositories, issues, and pull requests" },
            ServiceDef { name: "gmail", description: "Gmail mailboxes" },
            ServiceDef { name: "notion", description: "Notion pages and databases" },
            ServiceDef { name: "twitch", description: "Twitch streams and channels" },
            ServiceDef { name: "slack", description: "Slack workspaces" },
            ServiceDef { name: "system", description: "Engine-internal utilities" },
        ];

        let actions = vec![
            ActionDef {
                service: "timer",
                name: "timer_daily",
                description: "Fires every day at a fixed hour and minute (UTC)",
                channel: TriggerChannel::Timer,
                schema: TIMER_DAILY_SCHEMA,
            },
            ActionDef {
                service: "timer",
                name: "timer_weekly",
                description: "Fires every week at a fixed day, hour, and minute (UTC)",
                channel: TriggerChannel::Timer,
                schema: TIMER_WEEKLY_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_new_issue",
                description: "A new issue is opened in a repository",
                channel: TriggerChannel::Poll,
                schema: GITHUB_REPO_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_new_pr",
                description: "A new pull request is opened in a repository",
                channel: TriggerChannel::Poll,
                schema: GITHUB_REPO_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_push",
                description: "Commits are pushed to a repository",
                channel: TriggerChannel::Webhook,
                schema: GITHUB_WEBHOOK_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_issue",
                description: "Issue activity in a repository",
                channel: TriggerChannel::Webhook,
                schema: GITHUB_WEBHOOK_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_pull_request",
                description: "Pull request activity in a repository",
                channel: TriggerChannel::Webhook,
                schema: GITHUB_WEBHOOK_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_issue_comment",
                description: "A comment is posted on an issue",
                channel: TriggerChannel::Webhook,
                schema: GITHUB_WEBHOOK_SCHEMA,
            },
            ActionDef {
                service: "github",
                name: "github_star",
                description: "A repository is starred",
                channel: TriggerChannel::Webhook,
                schema: GITHUB_WEBHOOK_SCHEMA,
            },
            ActionDef {
                service: "gmail",
                name: "gmail_received",
                description: "An email arrives in the mailbox",
                channel: TriggerChannel::Webhook,
                schema: GMAIL_RECEIVED_SCHEMA,
            },
            ActionDef {
                service: "notion",
                name: "notion_page_updated",
                description: "A Notion page changes",
                channel: TriggerChannel::Webhook,
                schema: NOTION_PAGE_SCHEMA,
            },
            ActionDef {
                service: "twitch",
                name: "twitch_stream_online",
                description: "A broadcaster goes live",
                channel: TriggerChannel::Webhook,
                schema: TWITCH_BROADCASTER_SCHEMA,
            },
            ActionDef {
                service: "twitch",
                name: "twitch_follow",
                description: "A channel gains a follower",
                channel: TriggerChannel::Webhook,
                schema: TWITCH_BROADCASTER_SCHEMA,
            },
        ];

        let reactions = vec![
            ReactionDef {
                service: "gmail",
                name: "send_email",
                description: "Send an email from the owner's mailbox",
                schema: SEND_EMAIL_SCHEMA,
            },
            ReactionDef {
                service: "github",
                name: "github_create_issue",
                description: "Open an issue in a repository",
                schema: GITHUB_CREATE_ISSUE_SCHEMA,
            },
            ReactionDef {
                service: "github",
                name: "github_post_comment",
                description: "Comment on an issue or pull request",
                schema: GITHUB_POST_COMMENT_SCHEMA,
            },
            ReactionDef {
                service: "slack",
                name: "slack_send_message",
                description: "Post a message to a Slack channel",
                schema: SLACK_MESSAGE_SCHEMA,
            },
            ReactionDef {
                service: "system",
                name: "log_message",
                description: "Write a message to the engine log",
                schema: LOG_MESSAGE_SCHEMA,
            },
        ];

        let webhook_events = vec![
            WebhookEventMapping { service: "github", event_type: "push", action_name: "github_push" },
            WebhookEventMapping { service: "github", event_type: "issues", action_name: "github_issue" },
            WebhookEventMapping { service: "github", event_type: "pull_request", action_name: "github_pull_request" },
            WebhookEventMapping { service: "github", event_type: "issue_comment", action_name: "github_issue_comment" },
            WebhookEventMapping { service: "github", event_type: "star", action_name: "github_star" },
            WebhookEventMapping { service: "gmail", event_type: "message", action_name: "gmail_received" },
            WebhookEventMapping { service: "gmail", event_type: "email_received", action_name: "gmail_received" },
            WebhookEventMapping { service: "notion", event_type: "page", action_name: "notion_page_updated" },
            WebhookEventMapping { service: "twitch", event_type: "stream.online", action_name: "twitch_stream_online" },
            WebhookEventMapping { service: "twitch", event_type: "channel.follow", action_name: "twitch_follow" },
        ];

        Catalog { services, actions, reactions, webhook_events }
    }

    pub fn services(&self) -> &[ServiceDef] {
        &self.services
    }

    pub fn actions(&self) -> &[ActionDef] {
        &self.actions
    }

    pub fn reactions(&self) -> &[ReactionDef] {
        &self.reactions
    }

    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn reaction(&self, name: &str) -> Option<&ReactionDef> {
        self.reactions.iter().find(|r| r.name == name)
    }

    /// All timer action names.
    pub fn timer_action_names(&self) -> Vec<&'static str> {
        self.actions
            .iter()
            .filter(|a| a.channel == TriggerChannel::Timer)
            .map(|a| a.name)
            .collect()
    }

    /// The action a webhook `(service, event_type)` pair maps to.
    pub fn action_for_webhook_event(&self, service: &str, event_type: &str) -> Option<&'static str> {
        self.webhook_events
            .iter()
            .find(|m| m.service == service && m.event_type == event_type)
            .map(|m| m.action_name)
    }

    /// The webhook event type that covers a polled action, if any.
    ///
    /// Used for the smart polling skip: when an owner holds an active
    /// subscription for this event type, polling the action is redundant.
    pub fn covering_event_type(&self, action_name: &str) -> Option<&'static str> {
        match action_name {
            "github_new_issue" => Some("issues"),
            "github_new_pr" => Some("pull_request"),
            _ => None,
        }
    }

    /// Whether an action/reaction pair is allowed.
    pub fn compatible(&self, action_name: &str, reaction_name: &str) -> bool {
        !INCOMPATIBLE_PAIRS
            .iter()
            .any(|(a, r)| *a == action_name && *r == reaction_name)
    }

    /// Validate an automation's action/reaction names, configs, and pair
    /// compatibility.
    pub fn validate_automation(&self, automation: &Automation) -> Result<(), String> {
        let action = self
            .action(&automation.action_name)
            .ok_or_else(|| format!("unknown action '{}'", automation.action_name))?;
        let reaction = self
            .reaction(&automation.reaction_name)
            .ok_or_else(|| format!("unknown reaction '{}'", automation.reaction_name))?;

        action
            .schema
            .validate(&automation.action_config)
            .map_err(|e| format!("action config: {e}"))?;
        reaction
            .schema
            .validate(&automation.reaction_config)
            .map_err(|e| format!("reaction config: {e}"))?;

        if !self.compatible(action.name, reaction.name) {
            return Err(format!(
                "action '{}' cannot be paired with reaction '{}'",
                action.name, reaction.name
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_lookups() {
        let catalog = Catalog::builtin();
        assert!(catalog.action("timer_daily").is_some());
        assert!(catalog.action("github_new_issue").is_some());
        assert!(catalog.reaction("send_email").is_some());
        assert!(catalog.action("nope").is_none());
    }

    #[test]
    fn test_webhook_event_mapping() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.action_for_webhook_event("github", "push"), Some("github_push"));
        assert_eq!(catalog.action_for_webhook_event("gmail", "email_received"), Some("gmail_received"));
        assert_eq!(catalog.action_for_webhook_event("github", "deployment"), None);
        assert_eq!(catalog.action_for_webhook_event("jira", "issue"), None);
    }

    #[test]
    fn test_covering_event_type() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.covering_event_type("github_new_issue"), Some("issues"));
        assert_eq!(catalog.covering_event_type("timer_daily"), None);
    }

    #[test]
    fn test_timer_actions() {
        let names = Catalog::builtin().timer_action_names();
        assert!(names.contains(&"timer_daily"));
        assert!(names.contains(&"timer_weekly"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_incompatible_pair_rejected() {
        let catalog = Catalog::builtin();
        assert!(!catalog.compatible("github_new_issue", "github_create_issue"));
        assert!(catalog.compatible("timer_daily", "send_email"));
    }

    #[test]
    fn test_validate_automation() {
        let catalog = Catalog::builtin();

        let ok = Automation::new("u", "Digest", "timer_daily", "send_email")
            .with_action_config(json!({"hour": 14, "minute": 30}))
            .with_reaction_config(json!({
                "recipient": "u@x.io", "subject": "Hi", "body": "Hello"
            }));
        assert!(catalog.validate_automation(&ok).is_ok());

        let bad_config = Automation::new("u", "Digest", "timer_daily", "send_email")
            .with_action_config(json!({"hour": 27, "minute": 30}))
            .with_reaction_config(json!({
                "recipient": "u@x.io", "subject": "Hi", "body": "Hello"
            }));
        assert!(catalog.validate_automation(&bad_config).is_err());

        let unknown_action = Automation::new("u", "X", "no_such_action", "send_email");
        assert!(catalog.validate_automation(&unknown_action).is_err());

        let incompatible = Automation::new("u", "Loop", "github_new_issue", "github_create_issue")
            .with_action_config(json!({"repository": "o/r"}))
            .with_reaction_config(json!({"repository": "o/r", "title": "t"}));
        assert!(catalog.validate_automation(&incompatible).is_err());
    }
}
