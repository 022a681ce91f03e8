//! Service token domain model.
//!
//! One token row per `(owner, service)`. Token values are sensitive and
//! must never appear in logs; the `Debug` impl redacts them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth credentials for one user on one service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceToken {
    pub id: Uuid,
    pub owner: String,
    pub service: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` for providers that mint non-expiring tokens.
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub token_type: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceToken {
    pub fn new(
        owner: impl Into<String>,
        service: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            service: service.into(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
            token_type: "Bearer".to_string(),
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Whether the token is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whether the token is expired or will expire within `window`.
    ///
    /// This is the proactive-refresh predicate: callers refresh rather
    /// than risking an expired token mid-call.
    pub fn needs_refresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at.is_some_and(|at| now + window >= at)
    }
}

impl std::fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceToken")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("service", &self.service)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_expiring_token_never_needs_refresh() {
        let token = ServiceToken::new("u", "github", "gho_abc");
        let now = Utc::now();
        assert!(!token.is_expired(now));
        assert!(!token.needs_refresh(now, Duration::minutes(5)));
    }

    #[test]
    fn test_expired_token() {
        let now = Utc::now();
        let token = ServiceToken::new("u", "google", "ya29.x")
            .with_expires_at(now - Duration::hours(1));
        assert!(token.is_expired(now));
        assert!(token.needs_refresh(now, Duration::minutes(5)));
    }

    #[test]
    fn test_proactive_window() {
        let now = Utc::now();
        // Expires in 3 minutes: inside a 5-minute window, not yet expired.
        let token = ServiceToken::new("u", "google", "ya29.x")
            .with_expires_at(now + Duration::minutes(3));
        assert!(!token.is_expired(now));
        assert!(token.needs_refresh(now, Duration::minutes(5)));
        // A zero window only refreshes on hard expiry.
        assert!(!token.needs_refresh(now, Duration::zero()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = ServiceToken::new("u", "github", "gho_secret_value")
            .with_refresh_token("ghr_secret_value");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("gho_secret_value"));
        assert!(!rendered.contains("ghr_secret_value"));
        assert!(rendered.contains("<redacted>"));
    }
}
