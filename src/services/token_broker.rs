//! Token broker: valid access tokens for outbound calls.
//!
//! Serves `get_valid_token(owner, service)` with transparent proactive
//! refresh. Concurrent refreshes for the same `(owner, service)` are
//! coalesced by a per-key async mutex; a conditional update on the
//! stored `expires_at` additionally tolerates multi-process deployments.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{NotificationKind, ServiceToken};
use crate::domain::ports::{OAuthProvider, TokenRepository, TokenUpdate};
use crate::services::notifications::NotificationService;

pub struct TokenBroker {
    tokens: Arc<dyn TokenRepository>,
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
    notifications: Arc<NotificationService>,
    refresh_window: Duration,
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TokenBroker {
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        providers: Vec<Arc<dyn OAuthProvider>>,
        notifications: Arc<NotificationService>,
        refresh_window_seconds: u64,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.service().to_string(), p))
            .collect();
        Self {
            tokens,
            providers,
            notifications,
            refresh_window: Duration::seconds(refresh_window_seconds as i64),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// A currently valid access token for `(owner, service)`, refreshing
    /// proactively when the stored token is within the refresh window.
    ///
    /// Returns `None` when no token exists or when it expired and cannot
    /// be refreshed.
    pub async fn get_valid_token(&self, owner: &str, service: &str) -> DomainResult<Option<String>> {
        let Some(token) = self.tokens.get(owner, service).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if !token.needs_refresh(now, self.refresh_window) {
            return Ok(Some(token.access_token));
        }

        if !self.can_refresh(&token) {
            if token.is_expired(now) {
                self.report(
                    owner,
                    service,
                    NotificationKind::TokenExpired,
                    &format!("Access token for {service} expired and cannot be refreshed"),
                )
                .await;
                return Ok(None);
            }
            // Inside the window but not past expiry, and the provider
            // mints long-lived tokens: hand out the current one as-is.
            return Ok(Some(token.access_token));
        }

        self.refresh_serialized(owner, service, false).await
    }

    /// Refresh now regardless of the window, e.g. after an upstream 401.
    ///
    /// Returns the new access token, or `None` when refresh is not
    /// possible or failed.
    pub async fn force_refresh(&self, owner: &str, service: &str) -> DomainResult<Option<String>> {
        let Some(token) = self.tokens.get(owner, service).await? else {
            return Ok(None);
        };
        if !self.can_refresh(&token) {
            return Ok(None);
        }
        self.refresh_serialized(owner, service, true).await
    }

    /// Stamp `last_used_at` after a successful outbound call.
    pub async fn mark_used(&self, owner: &str, service: &str) -> DomainResult<()> {
        self.tokens.mark_used(owner, service, Utc::now()).await
    }

    fn can_refresh(&self, token: &ServiceToken) -> bool {
        token.refresh_token.is_some()
            && self
                .providers
                .get(&token.service)
                .is_some_and(|p| p.supports_refresh())
    }

    fn lock_for(&self, owner: &str, service: &str) -> Arc<AsyncMutex<()>> {
        let key = format!("{owner}/{service}");
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key).or_default().clone()
    }

    async fn refresh_serialized(
        &self,
        owner: &str,
        service: &str,
        force: bool,
    ) -> DomainResult<Option<String>> {
        let key_lock = self.lock_for(owner, service);
        let _guard = key_lock.lock().await;

        // Re-read under the lock: a coalesced caller may find the token
        // already refreshed and return it without an outbound call.
        let Some(current) = self.tokens.get(owner, service).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        if !force && !current.needs_refresh(now, self.refresh_window) {
            return Ok(Some(current.access_token));
        }
        let Some(refresh_token) = current.refresh_token.clone() else {
            return Ok(None);
        };
        let Some(provider) = self.providers.get(service) else {
            return Ok(None);
        };

        match provider.refresh(&refresh_token).await {
            Ok(refreshed) => {
                let expires_at = refreshed
                    .expires_in_seconds
                    .map(|secs| now + Duration::seconds(secs as i64));
                let update = TokenUpdate {
                    access_token: refreshed.access_token.clone(),
                    expires_at,
                    refresh_token: refreshed.refresh_token,
                };
                let applied = self
                    .tokens
                    .update_after_refresh(owner, service, current.expires_at, &update)
                    .await?;

                if !applied {
                    // Another process won the compare-and-set; use what it
                    // stored.
                    let stored = self.tokens.get(owner, service).await?;
                    return Ok(stored.map(|t| t.access_token));
                }

                tracing::info!(owner = owner, service = service, "Refreshed access token");
                Ok(Some(refreshed.access_token))
            }
            Err(e) => {
                tracing::warn!(
                    owner = owner,
                    service = service,
                    error = %e,
                    "Token refresh failed"
                );
                self.report(
                    owner,
                    service,
                    NotificationKind::RefreshFailed,
                    &format!("Failed to refresh {service} credentials: {e}"),
                )
                .await;
                Ok(None)
            }
        }
    }

    async fn report(&self, owner: &str, service: &str, kind: NotificationKind, message: &str) {
        if let Err(e) = self.notifications.report(owner, service, kind, message).await {
            tracing::error!(error = %e, "Failed to record OAuth notification");
        }
    }
}
