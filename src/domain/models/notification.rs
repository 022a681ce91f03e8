//! User-visible OAuth failure notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Class of OAuth failure being surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TokenExpired,
    RefreshFailed,
    AuthError,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenExpired => "token_expired",
            Self::RefreshFailed => "refresh_failed",
            Self::AuthError => "auth_error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "token_expired" => Some(Self::TokenExpired),
            "refresh_failed" => Some(Self::RefreshFailed),
            "auth_error" => Some(Self::AuthError),
            _ => None,
        }
    }
}

/// A deduplicated, user-visible record of an OAuth problem.
///
/// At most one unresolved notification exists per `(owner, service,
/// kind)`; repeated failures update the message in place. A successful
/// reconnect resolves all open notifications for the pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthNotification {
    pub id: Uuid,
    pub owner: String,
    pub service: String,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl OAuthNotification {
    pub fn new(
        owner: impl Into<String>,
        service: impl Into<String>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            service: service.into(),
            kind,
            message: message.into(),
            is_read: false,
            is_resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.is_resolved = true;
        self.resolved_at = Some(at);
    }
}
