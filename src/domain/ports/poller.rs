//! Service poller port.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActionState, Automation};

/// One item discovered by a poll cycle.
#[derive(Debug, Clone)]
pub struct PolledItem {
    /// Upstream's own opaque id for the item (issue id, message id,
    /// commit SHA). The poll runner prefixes it with the service name to
    /// form the external event id.
    pub stable_id: String,
    /// Salient fields of the item, handed to the reaction handler.
    pub trigger_data: Value,
}

impl PolledItem {
    pub fn new(stable_id: impl Into<String>, trigger_data: Value) -> Self {
        Self {
            stable_id: stable_id.into(),
            trigger_data,
        }
    }
}

/// Port for per-service pollers.
///
/// A poller knows how to query one upstream service for the items behind
/// its actions. The shared contract (active-automation fan-out, smart
/// skip, cursor updates, retry and error classification) lives in the
/// poll runner; implementations only fetch and filter.
#[async_trait]
pub trait ServicePoller: Send + Sync {
    /// Service this poller serves, e.g. `github`.
    fn service(&self) -> &'static str;

    /// Catalog action names this poller covers.
    fn actions(&self) -> &'static [&'static str];

    /// Fetch items for one automation, newest first.
    ///
    /// `state` carries the cursor of the previous cycle; implementations
    /// should use `last_checked_at`/`last_event_id` to request deltas and
    /// must only return items matching the automation's action config.
    async fn poll(
        &self,
        automation: &Automation,
        state: &ActionState,
        access_token: &str,
    ) -> DomainResult<Vec<PolledItem>>;
}
