//! Automation repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Automation;

/// Persistence port for automations.
///
/// The core engine only reads automations; the write methods exist for
/// the management surface and for test setup.
#[async_trait]
pub trait AutomationRepository: Send + Sync {
    async fn create(&self, automation: &Automation) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Automation>>;

    async fn update(&self, automation: &Automation) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// All active automations whose action is one of `action_names`.
    async fn list_active_by_actions(&self, action_names: &[&str]) -> DomainResult<Vec<Automation>>;

    /// All active automations owned by `owner` whose action is one of
    /// `action_names`. Used by the webhook subscription manager to decide
    /// whether a subscription still has dependents.
    async fn list_active_by_owner_and_actions(
        &self,
        owner: &str,
        action_names: &[&str],
    ) -> DomainResult<Vec<Automation>>;
}
