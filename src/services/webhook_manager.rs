//! Webhook subscription lifecycle.
//!
//! Reacts to automation writes from the management surface: registers an
//! upstream push channel when an automation's action supports one,
//! re-registers when the watched config changes, and revokes on delete
//! only when no other automation of the same owner still needs the
//! subscription. Registration failure is never fatal; the automation
//! falls back to polling.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Automation, WebhookSubscription, WebhookSubscriptionStatus};
use crate::domain::ports::{
    AutomationRepository, WebhookRegistrar, WebhookSubscriptionRepository,
};
use crate::services::catalog::Catalog;
use crate::services::token_broker::TokenBroker;

pub struct WebhookSubscriptionManager {
    subscriptions: Arc<dyn WebhookSubscriptionRepository>,
    automations: Arc<dyn AutomationRepository>,
    broker: Arc<TokenBroker>,
    registrars: HashMap<&'static str, Arc<dyn WebhookRegistrar>>,
    catalog: &'static Catalog,
}

impl WebhookSubscriptionManager {
    pub fn new(
        subscriptions: Arc<dyn WebhookSubscriptionRepository>,
        automations: Arc<dyn AutomationRepository>,
        broker: Arc<TokenBroker>,
        registrars: Vec<Arc<dyn WebhookRegistrar>>,
    ) -> Self {
        let registrars = registrars.into_iter().map(|r| (r.service(), r)).collect();
        Self {
            subscriptions,
            automations,
            broker,
            registrars,
            catalog: Catalog::builtin(),
        }
    }

    fn registrar_for(&self, automation: &Automation) -> Option<(&'static str, Arc<dyn WebhookRegistrar>)> {
        let service = self.catalog.action(&automation.action_name)?.service;
        let registrar = self.registrars.get(service)?.clone();
        Some((service, registrar))
    }

    /// Handle a newly created automation.
    ///
    /// Returns the subscription now covering the automation, or `None`
    /// when the action has no push channel or registration fell back to
    /// polling.
    pub async fn on_automation_created(
        &self,
        automation: &Automation,
    ) -> DomainResult<Option<WebhookSubscription>> {
        let Some((service, registrar)) = self.registrar_for(automation) else {
            return Ok(None);
        };
        let Some(event_type) = registrar.event_type_for(automation) else {
            return Ok(None);
        };

        // One subscription per (owner, service, event type) is shared by
        // all of the owner's automations.
        let existing = self
            .subscriptions
            .list_active_by_event(&automation.owner, service, &event_type)
            .await?;
        if let Some(sub) = existing.into_iter().next() {
            tracing::debug!(
                automation_id = %automation.id,
                subscription_id = %sub.id,
                "Reusing existing webhook subscription"
            );
            return Ok(Some(sub));
        }

        let Some(token) = self.broker.get_valid_token(&automation.owner, service).await? else {
            tracing::warn!(
                automation_id = %automation.id,
                service = service,
                "No valid token for webhook registration, falling back to polling"
            );
            return Ok(None);
        };

        match registrar.register(automation, &token).await {
            Ok(external_id) => {
                let subscription =
                    WebhookSubscription::new(&automation.owner, service, &event_type)
                        .with_external_id(external_id)
                        .with_config(watched_config(&registrar, automation));
                self.subscriptions.insert(&subscription).await?;
                tracing::info!(
                    automation_id = %automation.id,
                    subscription_id = %subscription.id,
                    service = service,
                    event_type = %event_type,
                    "Registered webhook subscription"
                );
                Ok(Some(subscription))
            }
            Err(e) => {
                tracing::warn!(
                    automation_id = %automation.id,
                    service = service,
                    error = %e,
                    "Webhook registration failed, falling back to polling"
                );
                let mut failed =
                    WebhookSubscription::new(&automation.owner, service, &event_type)
                        .with_config(watched_config(&registrar, automation));
                failed.status = WebhookSubscriptionStatus::Failed;
                self.subscriptions.insert(&failed).await?;
                Ok(None)
            }
        }
    }

    /// Handle an automation update: re-register when a watched config key
    /// changed.
    pub async fn on_automation_updated(
        &self,
        previous_action_config: &Value,
        automation: &Automation,
    ) -> DomainResult<()> {
        let Some((_, registrar)) = self.registrar_for(automation) else {
            return Ok(());
        };

        let changed = registrar.watched_config_keys().iter().any(|key| {
            previous_action_config.get(key) != automation.action_config.get(key)
        });
        if !changed {
            return Ok(());
        }

        tracing::info!(
            automation_id = %automation.id,
            "Watched webhook config changed, re-registering subscription"
        );
        self.revoke_if_unused(automation, Some(automation.id)).await?;
        self.on_automation_created(automation).await?;
        Ok(())
    }

    /// Handle an automation deletion: revoke the subscription if no other
    /// automation of the owner still needs it.
    pub async fn on_automation_deleted(&self, automation: &Automation) -> DomainResult<()> {
        self.revoke_if_unused(automation, Some(automation.id)).await
    }

    async fn revoke_if_unused(
        &self,
        automation: &Automation,
        excluding: Option<Uuid>,
    ) -> DomainResult<()> {
        let Some((service, registrar)) = self.registrar_for(automation) else {
            return Ok(());
        };
        let Some(event_type) = registrar.event_type_for(automation) else {
            return Ok(());
        };

        let dependents = self
            .automations
            .list_active_by_owner_and_actions(&automation.owner, &[&automation.action_name])
            .await?
            .into_iter()
            .filter(|a| Some(a.id) != excluding)
            .count();
        if dependents > 0 {
            tracing::debug!(
                automation_id = %automation.id,
                dependents,
                "Subscription still needed by other automations, keeping"
            );
            return Ok(());
        }

        let subs = self
            .subscriptions
            .list_active_by_event(&automation.owner, service, &event_type)
            .await?;
        for sub in subs {
            if let Some(external_id) = &sub.external_subscription_id {
                match self.broker.get_valid_token(&automation.owner, service).await? {
                    Some(token) => {
                        if let Err(e) = registrar.revoke(external_id, &token).await {
                            tracing::warn!(
                                subscription_id = %sub.id,
                                error = %e,
                                "Upstream webhook revocation failed"
                            );
                        }
                    }
                    None => tracing::warn!(
                        subscription_id = %sub.id,
                        "No token available to revoke subscription upstream"
                    ),
                }
            }
            self.subscriptions
                .set_status(sub.id, WebhookSubscriptionStatus::Revoked)
                .await?;
            tracing::info!(subscription_id = %sub.id, "Revoked webhook subscription");
        }

        Ok(())
    }
}

/// The subset of the automation's action config the registrar watches,
/// stored on the subscription for change detection.
fn watched_config(registrar: &Arc<dyn WebhookRegistrar>, automation: &Automation) -> Value {
    let mut map = serde_json::Map::new();
    for key in registrar.watched_config_keys() {
        if let Some(value) = automation.action_config.get(*key) {
            map.insert((*key).to_string(), value.clone());
        }
    }
    Value::Object(map)
}
