//! Action state (poll cursor) repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ActionState;

/// Persistence port for poll cursors.
#[async_trait]
pub trait ActionStateRepository: Send + Sync {
    async fn get(&self, automation_id: Uuid) -> DomainResult<Option<ActionState>>;

    /// Insert or replace the cursor row for its automation.
    async fn upsert(&self, state: &ActionState) -> DomainResult<()>;

    async fn delete(&self, automation_id: Uuid) -> DomainResult<()>;
}
