//! GitHub reaction handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{HandlerError, ReactionHandler};
use crate::services::token_broker::TokenBroker;

use super::client::{split_repository, GitHubClient};
use super::models::GitHubCreateIssueRequest;

fn require_str<'a>(config: &'a Value, key: &str) -> Result<&'a str, HandlerError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::InvalidConfig(format!("missing '{key}'")))
}

fn parse_repository(config: &Value) -> Result<(&str, &str), HandlerError> {
    let full_name = require_str(config, "repository")?;
    split_repository(full_name)
        .ok_or_else(|| HandlerError::InvalidConfig(format!("invalid repository '{full_name}'")))
}

async fn github_token(broker: &TokenBroker, owner: &str) -> Result<String, HandlerError> {
    match broker.get_valid_token(owner, "github").await {
        Ok(Some(token)) => Ok(token),
        Ok(None) => Err(HandlerError::Auth("no valid GitHub token".to_string())),
        Err(e) => Err(HandlerError::Transient(e.to_string())),
    }
}

/// `github_create_issue`: open an issue in a configured repository.
pub struct GitHubCreateIssueHandler {
    client: Arc<GitHubClient>,
    broker: Arc<TokenBroker>,
}

impl GitHubCreateIssueHandler {
    pub fn new(client: Arc<GitHubClient>, broker: Arc<TokenBroker>) -> Self {
        Self { client, broker }
    }
}

#[async_trait]
impl ReactionHandler for GitHubCreateIssueHandler {
    fn name(&self) -> &'static str {
        "github_create_issue"
    }

    async fn handle(
        &self,
        reaction_config: &Value,
        _trigger_data: &Value,
        owner: &str,
    ) -> Result<Value, HandlerError> {
        let (repo_owner, repo) = parse_repository(reaction_config)?;
        let title = require_str(reaction_config, "title")?;
        let body = reaction_config.get("body").and_then(Value::as_str);
        let labels = reaction_config
            .get("labels")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            });

        let token = github_token(&self.broker, owner).await?;
        let request = GitHubCreateIssueRequest {
            title: title.to_string(),
            body: body.map(str::to_string),
            labels,
        };

        let created = self
            .client
            .create_issue(&token, repo_owner, repo, &request)
            .await
            .map_err(HandlerError::from)?;

        if let Err(e) = self.broker.mark_used(owner, "github").await {
            tracing::debug!(error = %e, "Failed to stamp token usage");
        }

        Ok(json!({
            "issue_number": created.number,
            "url": created.html_url,
        }))
    }
}

/// `github_post_comment`: comment on an issue or pull request.
///
/// The issue number comes from the reaction config when fixed, or from
/// the trigger data (`number`) when the automation reacts to issue
/// events.
pub struct GitHubPostCommentHandler {
    client: Arc<GitHubClient>,
    broker: Arc<TokenBroker>,
}

impl GitHubPostCommentHandler {
    pub fn new(client: Arc<GitHubClient>, broker: Arc<TokenBroker>) -> Self {
        Self { client, broker }
    }

    fn issue_number(reaction_config: &Value, trigger_data: &Value) -> Result<u64, HandlerError> {
        if let Some(n) = reaction_config.get("issue_number").and_then(Value::as_u64) {
            return Ok(n);
        }
        trigger_data
            .get("number")
            .and_then(Value::as_u64)
            .or_else(|| trigger_data.pointer("/event_data/issue/number").and_then(Value::as_u64))
            .ok_or_else(|| {
                HandlerError::InvalidConfig(
                    "no issue_number configured and none found in trigger data".to_string(),
                )
            })
    }
}

#[async_trait]
impl ReactionHandler for GitHubPostCommentHandler {
    fn name(&self) -> &'static str {
        "github_post_comment"
    }

    async fn handle(
        &self,
        reaction_config: &Value,
        trigger_data: &Value,
        owner: &str,
    ) -> Result<Value, HandlerError> {
        let (repo_owner, repo) = parse_repository(reaction_config)?;
        let body = require_str(reaction_config, "body")?;
        let number = Self::issue_number(reaction_config, trigger_data)?;

        let token = github_token(&self.broker, owner).await?;
        self.client
            .post_comment(&token, repo_owner, repo, number, body)
            .await
            .map_err(HandlerError::from)?;

        if let Err(e) = self.broker.mark_used(owner, "github").await {
            tracing::debug!(error = %e, "Failed to stamp token usage");
        }

        Ok(json!({"commented_on": number}))
    }
}
