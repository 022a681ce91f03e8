//! Typed GitHub REST API payloads.

use serde::{Deserialize, Serialize};

/// An issue as returned by `GET /repos/{owner}/{repo}/issues`.
///
/// The issues endpoint also returns pull requests; they carry a
/// `pull_request` marker object.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    pub user: Option<GitHubUser>,
    pub pull_request: Option<GitHubPullRequestRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequestRef {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct GitHubCreateIssueRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCreateIssueResponse {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Serialize)]
pub struct GitHubCommentRequest {
    pub body: String,
}
