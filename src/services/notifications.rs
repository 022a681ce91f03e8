//! OAuth notification service with deduplication.
//!
//! At most one unresolved notification exists per `(owner, service,
//! kind)`: repeated failures update the open notification's message in
//! place instead of creating rows. The OAuth callback (outside the core)
//! calls `resolve_all` after a successful reconnect.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{NotificationKind, OAuthNotification};
use crate::domain::ports::NotificationRepository;

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Record an OAuth failure, deduplicating against open notifications.
    pub async fn report(
        &self,
        owner: &str,
        service: &str,
        kind: NotificationKind,
        message: &str,
    ) -> DomainResult<()> {
        if let Some(open) = self.repo.find_open(owner, service, kind).await? {
            self.repo.update_message(open.id, message).await?;
            tracing::debug!(
                owner = owner,
                service = service,
                kind = kind.as_str(),
                "Updated open OAuth notification in place"
            );
            return Ok(());
        }

        let notification = OAuthNotification::new(owner, service, kind, message);
        match self.repo.insert(&notification).await {
            Ok(()) => {
                tracing::info!(
                    owner = owner,
                    service = service,
                    kind = kind.as_str(),
                    "Created OAuth notification"
                );
                Ok(())
            }
            Err(e) => {
                // A concurrent reporter may have inserted between our
                // find and insert; the partial unique index rejects the
                // duplicate. Fall back to the in-place update.
                if let Some(open) = self.repo.find_open(owner, service, kind).await? {
                    self.repo.update_message(open.id, message).await?;
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Resolve every open notification for `(owner, service)`.
    pub async fn resolve_all(&self, owner: &str, service: &str) -> DomainResult<u64> {
        let resolved = self.repo.resolve_all(owner, service, Utc::now()).await?;
        if resolved > 0 {
            tracing::info!(
                owner = owner,
                service = service,
                count = resolved,
                "Resolved OAuth notifications after reconnect"
            );
        }
        Ok(resolved)
    }

    pub async fn list_open(&self, owner: &str) -> DomainResult<Vec<OAuthNotification>> {
        self.repo.list_open_for_owner(owner).await
    }
}
