//! Service availability repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Service;

/// Persistence port for service availability rows.
///
/// The catalog of actions and reactions is code; this table only records
/// which services exist and whether they are currently active.
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn get(&self, name: &str) -> DomainResult<Option<Service>>;

    /// Insert the service if missing; existing rows keep their status.
    async fn seed(&self, service: &Service) -> DomainResult<()>;

    async fn set_status(&self, name: &str, active: bool) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<Service>>;
}
