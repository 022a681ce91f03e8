//! Poll runner: the shared contract around per-service pollers.
//!
//! Owns the cadence loop and everything pollers have in common: fan-out
//! over active automations, the webhook smart skip, token acquisition,
//! cursor management, transient retries, and error classification.
//! Pollers themselves only fetch and filter.

use std::collections::HashMap;
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionState, Automation, NotificationKind, TriggerEvent};
use crate::domain::models::config::PollingConfig;
use crate::domain::ports::{
    ActionStateRepository, AutomationRepository, PolledItem, ServicePoller, ServiceRepository,
    WebhookSubscriptionRepository,
};
use crate::services::admitter::ExecutionAdmitter;
use crate::services::catalog::Catalog;
use crate::services::notifications::NotificationService;
use crate::services::token_broker::TokenBroker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Ok,
    Skipped,
}

/// Outcome of one poll cycle for one service.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub service: String,
    pub status: CycleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub automations_polled: usize,
    pub automations_skipped: usize,
    pub executions_created: usize,
    pub executions_skipped: usize,
    pub errors: usize,
}

impl CycleSummary {
    fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            status: CycleStatus::Ok,
            reason: None,
            automations_polled: 0,
            automations_skipped: 0,
            executions_created: 0,
            executions_skipped: 0,
            errors: 0,
        }
    }
}

pub struct PollRunner {
    automations: Arc<dyn AutomationRepository>,
    states: Arc<dyn ActionStateRepository>,
    subscriptions: Arc<dyn WebhookSubscriptionRepository>,
    services: Arc<dyn ServiceRepository>,
    broker: Arc<TokenBroker>,
    admitter: Arc<ExecutionAdmitter>,
    notifications: Arc<NotificationService>,
    pollers: HashMap<&'static str, Arc<dyn ServicePoller>>,
    config: PollingConfig,
    catalog: &'static Catalog,
}

impl PollRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        automations: Arc<dyn AutomationRepository>,
        states: Arc<dyn ActionStateRepository>,
        subscriptions: Arc<dyn WebhookSubscriptionRepository>,
        services: Arc<dyn ServiceRepository>,
        broker: Arc<TokenBroker>,
        admitter: Arc<ExecutionAdmitter>,
        notifications: Arc<NotificationService>,
        pollers: Vec<Arc<dyn ServicePoller>>,
        config: PollingConfig,
    ) -> Self {
        let pollers = pollers.into_iter().map(|p| (p.service(), p)).collect();
        Self {
            automations,
            states,
            subscriptions,
            services,
            broker,
            admitter,
            notifications,
            pollers,
            config,
            catalog: Catalog::builtin(),
        }
    }

    pub fn services_with_pollers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.pollers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run one poll cycle for `service`.
    pub async fn run_cycle(&self, service: &str) -> DomainResult<CycleSummary> {
        let poller = self
            .pollers
            .get(service)
            .cloned()
            .ok_or_else(|| DomainError::ServiceNotFound(service.to_string()))?;

        let mut summary = CycleSummary::new(service);

        if let Some(row) = self.services.get(service).await? {
            if !row.is_active() {
                summary.status = CycleStatus::Skipped;
                summary.reason = Some("service_inactive".to_string());
                return Ok(summary);
            }
        }

        let automations = self.automations.list_active_by_actions(poller.actions()).await?;
        if automations.is_empty() {
            return Ok(summary);
        }

        let mut webhook_covered = 0;
        for automation in &automations {
            match self.poll_one(&poller, automation, &mut summary).await {
                PollOneOutcome::WebhookCovered => {
                    webhook_covered += 1;
                    summary.automations_skipped += 1;
                }
                PollOneOutcome::Skipped => summary.automations_skipped += 1,
                PollOneOutcome::Polled => summary.automations_polled += 1,
                PollOneOutcome::Errored => summary.errors += 1,
            }
        }

        if webhook_covered == automations.len() {
            summary.status = CycleStatus::Skipped;
            summary.reason = Some("all_users_have_webhooks".to_string());
        }

        tracing::info!(
            service = service,
            polled = summary.automations_polled,
            skipped = summary.automations_skipped,
            created = summary.executions_created,
            errors = summary.errors,
            "Poll cycle complete"
        );
        Ok(summary)
    }

    async fn poll_one(
        &self,
        poller: &Arc<dyn ServicePoller>,
        automation: &Automation,
        summary: &mut CycleSummary,
    ) -> PollOneOutcome {
        let service = poller.service();

        // Smart skip: a registered webhook subscription covering this
        // action means push delivery already handles it.
        if let Some(event_type) = self.catalog.covering_event_type(&automation.action_name) {
            match self
                .subscriptions
                .list_active_by_event(&automation.owner, service, event_type)
                .await
            {
                Ok(subs) if !subs.is_empty() => {
                    tracing::debug!(
                        automation_id = %automation.id,
                        event_type = event_type,
                        "Webhook subscription covers action, skipping poll"
                    );
                    return PollOneOutcome::WebhookCovered;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Subscription lookup failed");
                    return PollOneOutcome::Errored;
                }
            }
        }

        let token = match self.broker.get_valid_token(&automation.owner, service).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(
                    automation_id = %automation.id,
                    owner = %automation.owner,
                    "No valid token, skipping automation this cycle"
                );
                return PollOneOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token lookup failed");
                return PollOneOutcome::Errored;
            }
        };

        let state = match self.states.get(automation.id).await {
            Ok(Some(state)) => state,
            Ok(None) => ActionState::new(automation.id),
            Err(e) => {
                tracing::warn!(error = %e, "Action state lookup failed");
                return PollOneOutcome::Errored;
            }
        };

        match self.poll_with_retry(poller, automation, &state, &token).await {
            Ok(items) => {
                let newest = items.first().map(|i| i.stable_id.clone());
                self.admit_items(automation, poller.service(), items, summary).await;

                let mut state = state;
                state.mark_checked(Utc::now(), newest);
                if let Err(e) = self.states.upsert(&state).await {
                    tracing::warn!(error = %e, "Failed to persist action state");
                }
                if let Err(e) = self.broker.mark_used(&automation.owner, service).await {
                    tracing::debug!(error = %e, "Failed to stamp token usage");
                }
                PollOneOutcome::Polled
            }
            Err(DomainError::UpstreamUnauthorized(msg)) => {
                // Surface to the user and block the automation for this
                // cycle only; a reconnect unblocks it.
                if let Err(e) = self
                    .notifications
                    .report(
                        &automation.owner,
                        service,
                        NotificationKind::AuthError,
                        &format!("{service} rejected stored credentials: {msg}"),
                    )
                    .await
                {
                    tracing::error!(error = %e, "Failed to record auth notification");
                }
                PollOneOutcome::Errored
            }
            Err(e) => {
                tracing::warn!(
                    automation_id = %automation.id,
                    error = %e,
                    "Poll failed, skipping automation this cycle"
                );
                PollOneOutcome::Errored
            }
        }
    }

    /// Poll with a bounded transient-retry budget inside one cycle.
    async fn poll_with_retry(
        &self,
        poller: &Arc<dyn ServicePoller>,
        automation: &Automation,
        state: &ActionState,
        token: &str,
    ) -> DomainResult<Vec<PolledItem>> {
        let budget = self.config.transient_retry_budget;
        let mut delays = ExponentialBackoff {
            initial_interval: std::time::Duration::from_millis(500),
            max_interval: std::time::Duration::from_secs(10),
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match poller.poll(automation, state, token).await {
                Ok(items) => return Ok(items),
                Err(e) if e.is_transient() && attempt < budget => {
                    attempt += 1;
                    let delay = delays
                        .next_backoff()
                        .unwrap_or(std::time::Duration::from_secs(1));
                    tracing::debug!(
                        automation_id = %automation.id,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient poll failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn admit_items(
        &self,
        automation: &Automation,
        service: &str,
        items: Vec<PolledItem>,
        summary: &mut CycleSummary,
    ) {
        for item in items {
            let event_id = format!("{service}_{}", item.stable_id);
            let event = TriggerEvent::new(automation.id, event_id, item.trigger_data);
            match self.admitter.admit(event).await {
                Ok((_, true)) => summary.executions_created += 1,
                Ok((_, false)) => summary.executions_skipped += 1,
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(error = %e, "Failed to admit polled item");
                }
            }
        }
    }

    /// Spawn one cadence loop per registered poller.
    pub fn spawn_loops(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.services_with_pollers()
            .into_iter()
            .map(|service| {
                let runner = Arc::clone(self);
                let mut shutdown = shutdown.clone();
                let interval = std::time::Duration::from_secs(runner.config.interval_for(service));
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = tokio::time::sleep(interval) => {}
                            _ = shutdown.changed() => break,
                        }
                        if let Err(e) = runner.run_cycle(service).await {
                            tracing::error!(service = service, error = %e, "Poll cycle failed");
                        }
                    }
                    tracing::info!(service = service, "Poller stopped");
                })
            })
            .collect()
    }
}

enum PollOneOutcome {
    WebhookCovered,
    Skipped,
    Polled,
    Errored,
}
