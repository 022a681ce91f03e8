//! Upstream webhook registration port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Automation;

/// Port for services that support registering push channels upstream.
///
/// Used by the subscription manager when automations are created or
/// deleted. Services without push support simply have no registrar; their
/// automations stay on polling.
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Service this registrar serves, e.g. `notion`.
    fn service(&self) -> &'static str;

    /// Event type the given automation's action maps to upstream.
    fn event_type_for(&self, automation: &Automation) -> Option<String>;

    /// Config keys whose change requires re-registering the subscription
    /// (e.g. the watched page id).
    fn watched_config_keys(&self) -> &'static [&'static str];

    /// Register a subscription upstream. Returns the upstream's
    /// subscription id.
    async fn register(&self, automation: &Automation, access_token: &str) -> DomainResult<String>;

    /// Revoke a subscription upstream.
    async fn revoke(&self, external_subscription_id: &str, access_token: &str) -> DomainResult<()>;
}
