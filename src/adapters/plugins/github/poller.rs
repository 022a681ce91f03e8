//! GitHub poller: new issues and new pull requests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionState, Automation};
use crate::domain::ports::{PolledItem, ServicePoller};

use super::client::{split_repository, GitHubClient};
use super::models::GitHubIssue;

/// Polls repository issues for the `github_new_issue` and
/// `github_new_pr` actions.
///
/// GitHub's issues endpoint returns both issues and pull requests;
/// the automation's action decides which kind is kept. Incremental
/// polling uses the `since` cursor from the automation's ActionState,
/// and the previously seen item id stops reprocessing.
pub struct GitHubPoller {
    client: Arc<GitHubClient>,
}

impl GitHubPoller {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    fn wants_pull_requests(action_name: &str) -> bool {
        action_name == "github_new_pr"
    }

    /// Keep items that are new since the cursor, match the label filter,
    /// and are of the kind the action watches.
    fn select_items(
        automation: &Automation,
        state: &ActionState,
        issues: Vec<GitHubIssue>,
    ) -> Vec<GitHubIssue> {
        let want_prs = Self::wants_pull_requests(&automation.action_name);
        let label_filter: Option<Vec<String>> = automation
            .action_config
            .get("labels")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            });

        issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_some() == want_prs)
            .filter(|issue| {
                // Only items created after the last cycle count as new;
                // `since` also matches updates to old items.
                match state.last_checked_at {
                    Some(cursor) => issue
                        .created_at
                        .parse::<DateTime<Utc>>()
                        .map(|created| created > cursor)
                        .unwrap_or(false),
                    None => true,
                }
            })
            .filter(|issue| {
                state
                    .last_event_id
                    .as_deref()
                    .is_none_or(|seen| seen != issue.id.to_string())
            })
            .filter(|issue| match &label_filter {
                Some(wanted) if !wanted.is_empty() => issue
                    .labels
                    .iter()
                    .any(|l| wanted.iter().any(|w| w == &l.name)),
                _ => true,
            })
            .collect()
    }

    fn to_item(automation: &Automation, repository: &str, issue: &GitHubIssue) -> PolledItem {
        let kind = if issue.pull_request.is_some() { "pull_request" } else { "issue" };
        let trigger_data = json!({
            "service": "github",
            "action": automation.action_name,
            "repository": repository,
            "kind": kind,
            "number": issue.number,
            "title": issue.title,
            "body": issue.body,
            "url": issue.html_url,
            "author": issue.user.as_ref().map(|u| u.login.clone()),
            "labels": issue.labels.iter().map(|l| l.name.clone()).collect::<Vec<_>>(),
            "created_at": issue.created_at,
        });
        PolledItem::new(issue.id.to_string(), trigger_data)
    }
}

#[async_trait]
impl ServicePoller for GitHubPoller {
    fn service(&self) -> &'static str {
        "github"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["github_new_issue", "github_new_pr"]
    }

    async fn poll(
        &self,
        automation: &Automation,
        state: &ActionState,
        access_token: &str,
    ) -> DomainResult<Vec<PolledItem>> {
        let repository = automation.action_config_str("repository").ok_or_else(|| {
            DomainError::ValidationFailed("github poller config missing 'repository'".to_string())
        })?;
        let (owner, repo) = split_repository(repository).ok_or_else(|| {
            DomainError::ValidationFailed(format!("invalid repository '{repository}'"))
        })?;

        let since = state.last_checked_at.map(|t| t.to_rfc3339());

        tracing::debug!(
            automation_id = %automation.id,
            repository = repository,
            since = ?since,
            "Polling GitHub"
        );

        let issues = self
            .client
            .list_issues(access_token, owner, repo, since.as_deref())
            .await
            .map_err(DomainError::from)?;
        let total = issues.len();

        let selected = Self::select_items(automation, state, issues);
        let items: Vec<PolledItem> = selected
            .iter()
            .map(|issue| Self::to_item(automation, repository, issue))
            .collect();

        tracing::info!(
            automation_id = %automation.id,
            repository = repository,
            fetched = total,
            selected = items.len(),
            "GitHub poll complete"
        );

        Ok(items)
    }
}
