//! GitHub REST API v3 client with rate limiting.
//!
//! Tokens are passed per call (they belong to automation owners, not to
//! the process), so a single client instance serves every user. A
//! token-bucket rate limiter keeps the process within the authenticated
//! 5 000 req/hour ceiling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::ports::HandlerError;

use super::models::{
    GitHubCommentRequest, GitHubCreateIssueRequest, GitHubCreateIssueResponse, GitHubIssue,
};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Errors from GitHub calls, keeping the HTTP status for classification.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub request failed: {0}")]
    Network(String),
    #[error("GitHub returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("GitHub response parse failed: {0}")]
    Parse(String),
}

impl From<GitHubError> for DomainError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http { status: 401 | 403, ref body } => {
                DomainError::UpstreamUnauthorized(body.clone())
            }
            other => DomainError::UpstreamFailed(other.to_string()),
        }
    }
}

impl From<GitHubError> for HandlerError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http { status, body } => HandlerError::from_status(status, body),
            GitHubError::Network(msg) => HandlerError::Transient(msg),
            GitHubError::Parse(msg) => HandlerError::Transient(msg),
        }
    }
}

/// Process-wide request budget for the GitHub API.
///
/// One client instance serves every automation owner, so the budget is
/// shared across all of their tokens: `limit` request slots per rolling
/// window, tracked against a reset deadline. Once the window is spent,
/// claimers wait out the remainder rather than burning someone else's
/// quota on 403s.
#[derive(Debug)]
pub struct RequestBudget {
    limit: u32,
    spent: u32,
    window: Duration,
    resets_at: Instant,
}

impl RequestBudget {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            spent: 0,
            window,
            resets_at: Instant::now() + window,
        }
    }

    fn roll_window(&mut self) {
        self.spent = 0;
        self.resets_at = Instant::now() + self.window;
    }

    /// Claim one request slot, waiting for the next window when the
    /// current one is exhausted.
    pub async fn claim(&mut self) {
        if Instant::now() >= self.resets_at {
            self.roll_window();
        }

        if self.spent >= self.limit {
            let wait = self.resets_at.saturating_duration_since(Instant::now());
            tracing::warn!(
                service = "github",
                wait_secs = wait.as_secs(),
                limit = self.limit,
                "Outbound request budget exhausted, waiting for window reset"
            );
            tokio::time::sleep(wait).await;
            self.roll_window();
        }

        self.spent += 1;
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
    budget: Arc<Mutex<RequestBudget>>,
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubClient {
    pub fn new() -> Self {
        Self::with_base_url(GITHUB_API_BASE)
    }

    /// Point the client at a different API base (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            // 5 000 authenticated requests per hour.
            budget: Arc::new(Mutex::new(RequestBudget::new(
                5_000,
                Duration::from_secs(3_600),
            ))),
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        token: &str,
    ) -> reqwest::RequestBuilder {
        self.budget.lock().await.claim().await;
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "relay-engine")
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(GitHubError::Http { status, body })
    }

    /// List issues of a repository, newest first.
    ///
    /// When `since` is set (ISO 8601), only issues updated at or after
    /// that instant are returned. The endpoint also returns pull
    /// requests; callers filter on the `pull_request` marker.
    pub async fn list_issues(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        since: Option<&str>,
    ) -> Result<Vec<GitHubIssue>, GitHubError> {
        let mut url = format!(
            "{}/repos/{}/{}/issues?state=open&sort=created&direction=desc&per_page=100",
            self.base_url, owner, repo
        );
        if let Some(since) = since {
            url.push_str(&format!("&since={since}"));
        }

        let resp = self
            .request(reqwest::Method::GET, &url, token)
            .await
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        Self::check(resp)
            .await?
            .json::<Vec<GitHubIssue>>()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))
    }

    /// Open an issue in a repository.
    pub async fn create_issue(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        request: &GitHubCreateIssueRequest,
    ) -> Result<GitHubCreateIssueResponse, GitHubError> {
        let url = format!("{}/repos/{}/{}/issues", self.base_url, owner, repo);

        let resp = self
            .request(reqwest::Method::POST, &url, token)
            .await
            .json(request)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        Self::check(resp)
            .await?
            .json::<GitHubCreateIssueResponse>()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))
    }

    /// Post a comment on an issue or pull request.
    pub async fn post_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, owner, repo, issue_number
        );
        let request = GitHubCommentRequest { body: body.to_string() };

        let resp = self
            .request(reqwest::Method::POST, &url, token)
            .await
            .json(&request)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        Self::check(resp).await?;
        Ok(())
    }
}

/// Split a `owner/repo` config value.
pub fn split_repository(full_name: &str) -> Option<(&str, &str)> {
    let mut parts = full_name.splitn(2, '/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => Some((owner, repo)),
        _ => None,
    }
}
