//! OAuth provider port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Credentials returned by a successful refresh call.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Lifetime of the new token; `None` when the provider does not expire
    /// tokens.
    pub expires_in_seconds: Option<u64>,
    /// Present when the provider rotates refresh tokens.
    pub refresh_token: Option<String>,
}

/// Port for per-service OAuth providers.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Service this provider serves, e.g. `google`.
    fn service(&self) -> &'static str;

    /// Whether the provider supports refresh at all. Providers that mint
    /// long-lived non-expiring tokens (github) return `false`; the broker
    /// then hands out the stored token as-is.
    fn supports_refresh(&self) -> bool;

    /// Exchange a refresh token for new credentials. One outbound call.
    async fn refresh(&self, refresh_token: &str) -> DomainResult<RefreshedToken>;
}
