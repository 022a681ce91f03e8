//! OAuth providers used by the token broker.
//!
//! GitHub mints long-lived tokens without refresh; Google rotates
//! short-lived access tokens through its token endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::ProviderConfig;
use crate::domain::ports::{OAuthProvider, RefreshedToken};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// GitHub OAuth apps issue tokens that do not expire; there is nothing
/// to refresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitHubOAuthProvider;

#[async_trait]
impl OAuthProvider for GitHubOAuthProvider {
    fn service(&self) -> &'static str {
        "github"
    }

    fn supports_refresh(&self) -> bool {
        false
    }

    async fn refresh(&self, _refresh_token: &str) -> DomainResult<RefreshedToken> {
        Err(DomainError::ValidationFailed(
            "github does not support token refresh".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

pub struct GoogleOAuthProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
}

impl GoogleOAuthProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config
                .token_url
                .clone()
                .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    fn service(&self) -> &'static str {
        "google"
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh(&self, refresh_token: &str) -> DomainResult<RefreshedToken> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DomainError::UpstreamFailed(format!("token endpoint unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            // 400/401 here means the refresh token itself was rejected.
            if status == 400 || status == 401 {
                return Err(DomainError::UpstreamUnauthorized(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }
            return Err(DomainError::UpstreamFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::UpstreamFailed(format!("token response parse failed: {e}")))?;

        Ok(RefreshedToken {
            access_token: token.access_token,
            expires_in_seconds: token.expires_in,
            refresh_token: token.refresh_token,
        })
    }
}

/// A Google-shaped provider registered under a different service name.
///
/// Gmail tokens are Google tokens; the broker looks providers up by the
/// service the token row is stored under.
pub struct AliasedProvider<P> {
    service: &'static str,
    inner: P,
}

impl<P> AliasedProvider<P> {
    pub fn new(service: &'static str, inner: P) -> Self {
        Self { service, inner }
    }
}

#[async_trait]
impl<P: OAuthProvider> OAuthProvider for AliasedProvider<P> {
    fn service(&self) -> &'static str {
        self.service
    }

    fn supports_refresh(&self) -> bool {
        self.inner.supports_refresh()
    }

    async fn refresh(&self, refresh_token: &str) -> DomainResult<RefreshedToken> {
        self.inner.refresh(refresh_token).await
    }
}
