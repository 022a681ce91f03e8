//! GitHub plugin: REST client, issue/PR poller, and reactions.

pub mod client;
pub mod models;
pub mod poller;
pub mod reactions;

pub use client::{GitHubClient, GitHubError};
pub use poller::GitHubPoller;
pub use reactions::{GitHubCreateIssueHandler, GitHubPostCommentHandler};
