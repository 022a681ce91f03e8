//! Reaction dispatcher: queue, worker pool, retry, and dead-lettering.
//!
//! Executions are delivered at least once over the in-process queue; the
//! execution row is the source of truth, so redeliveries of a job whose
//! row already left `pending` are acknowledged and dropped. Failures are
//! classified per the handler error taxonomy: transient errors requeue
//! with exponential backoff until the per-service attempt budget is
//! exhausted, auth errors force one token refresh and a single retry,
//! config errors fail immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Automation, Execution, ExecutionStatus};
use crate::domain::models::config::DispatcherConfig;
use crate::domain::ports::{
    AlertSink, AutomationRepository, ExecutionRepository, HandlerError, ReactionHandler,
};
use crate::domain::models::NotificationKind;
use crate::services::backoff::RetryPolicy;
use crate::services::catalog::Catalog;
use crate::services::notifications::NotificationService;
use crate::services::registry::HandlerRegistry;
use crate::services::token_broker::TokenBroker;

/// One unit of queue work: run the next attempt of an execution.
#[derive(Debug, Clone, Copy)]
pub struct DispatchJob {
    pub execution_id: Uuid,
}

/// Cloneable producer half of the dispatch queue.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DispatchJob>,
}

impl DispatchQueue {
    /// Create a bounded queue; the receiver goes to the worker pool.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<DispatchJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue an execution for dispatch. Returns false when the queue
    /// is closed.
    pub async fn enqueue(&self, execution_id: Uuid) -> bool {
        self.tx.send(DispatchJob { execution_id }).await.is_ok()
    }

    /// Enqueue after a delay, without blocking the caller.
    pub fn enqueue_after(&self, execution_id: Uuid, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(DispatchJob { execution_id }).await.is_err() {
                tracing::warn!(
                    execution_id = %execution_id,
                    "Dispatch queue closed before delayed requeue"
                );
            }
        });
    }
}

pub struct Dispatcher {
    executions: Arc<dyn ExecutionRepository>,
    automations: Arc<dyn AutomationRepository>,
    registry: Arc<HandlerRegistry>,
    broker: Arc<TokenBroker>,
    notifications: Arc<NotificationService>,
    alerts: Arc<dyn AlertSink>,
    retry: RetryPolicy,
    config: DispatcherConfig,
    queue: DispatchQueue,
    catalog: &'static Catalog,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        automations: Arc<dyn AutomationRepository>,
        registry: Arc<HandlerRegistry>,
        broker: Arc<TokenBroker>,
        notifications: Arc<NotificationService>,
        alerts: Arc<dyn AlertSink>,
        config: DispatcherConfig,
        queue: DispatchQueue,
    ) -> Self {
        let retry = RetryPolicy::new(
            Duration::from_secs(config.retry_base_seconds),
            Duration::from_secs(config.retry_cap_seconds),
        );
        Self {
            executions,
            automations,
            registry,
            broker,
            notifications,
            alerts,
            retry,
            config,
            queue,
            catalog: Catalog::builtin(),
        }
    }

    /// Spawn the worker pool. Workers drain the queue until `shutdown`
    /// flips; each finishes its current execution before exiting.
    pub fn spawn_workers(
        self: &Arc<Self>,
        rx: mpsc::Receiver<DispatchJob>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let rx = Arc::new(AsyncMutex::new(rx));
        (0..self.config.worker_count.max(1))
            .map(|worker_id| {
                let dispatcher = Arc::clone(self);
                let rx = Arc::clone(&rx);
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    loop {
                        let job = {
                            let mut rx = rx.lock().await;
                            tokio::select! {
                                job = rx.recv() => job,
                                _ = shutdown.changed() => None,
                            }
                        };
                        let Some(job) = job else {
                            tracing::debug!(worker_id, "Dispatch worker draining");
                            break;
                        };
                        if let Err(e) = dispatcher.process_execution(job.execution_id).await {
                            tracing::error!(
                                worker_id,
                                execution_id = %job.execution_id,
                                error = %e,
                                "Dispatch worker error"
                            );
                        }
                    }
                })
            })
            .collect()
    }

    /// Run one attempt of an execution. Used by the worker pool and
    /// driven directly by tests.
    pub async fn process_execution(&self, execution_id: Uuid) -> DomainResult<()> {
        // The row is the source of truth: a purged or already-progressed
        // row means this queue delivery is stale.
        let Some(mut execution) = self.executions.get(execution_id).await? else {
            tracing::debug!(execution_id = %execution_id, "Execution row gone, acknowledging");
            return Ok(());
        };
        if execution.status != ExecutionStatus::Pending {
            tracing::debug!(
                execution_id = %execution_id,
                status = execution.status.as_str(),
                "Execution not pending, acknowledging redelivery"
            );
            return Ok(());
        }

        execution.begin_attempt()?;
        self.executions.update(&execution).await?;

        let Some(automation) = self.automations.get(execution.automation_id).await? else {
            execution.fail("Automation no longer exists")?;
            return self.executions.update(&execution).await;
        };

        let Some(handler) = self.registry.get(&automation.reaction_name) else {
            // Deliberately lenient: unknown reactions succeed with a note
            // so partial deployments do not block users.
            tracing::warn!(
                execution_id = %execution.id,
                reaction = %automation.reaction_name,
                "No handler registered for reaction"
            );
            execution.complete(json!({
                "note": format!("Reaction '{}' not implemented", automation.reaction_name),
            }))?;
            return self.executions.update(&execution).await;
        };

        match self.run_handler(&handler, &automation, &execution).await {
            Ok(result) => {
                execution.complete(result)?;
                self.executions.update(&execution).await?;
                tracing::info!(
                    execution_id = %execution.id,
                    automation_id = %automation.id,
                    attempt = execution.attempt_count,
                    "Execution succeeded"
                );
                Ok(())
            }
            Err(HandlerError::InvalidConfig(msg)) => {
                execution.fail(format!("Invalid config: {msg}"))?;
                self.executions.update(&execution).await
            }
            Err(HandlerError::Transient(msg)) => {
                self.retry_or_dead_letter(execution, &automation, &msg).await
            }
            Err(HandlerError::Auth(msg)) => {
                self.auth_retry(execution, &automation, &handler, &msg).await
            }
        }
    }

    /// Auth failure: force a token refresh and retry exactly once.
    async fn auth_retry(
        &self,
        mut execution: Execution,
        automation: &Automation,
        handler: &Arc<dyn ReactionHandler>,
        original_error: &str,
    ) -> DomainResult<()> {
        let service = self
            .catalog
            .reaction(&automation.reaction_name)
            .map(|r| r.service)
            .unwrap_or("unknown");

        let refreshed = self
            .broker
            .force_refresh(&automation.owner, service)
            .await?;

        if refreshed.is_none() {
            // No refresh available: the token is simply invalid.
            self.report_auth(&automation.owner, service, original_error).await;
            execution.fail(format!("Authorization failed with no refresh available: {original_error}"))?;
            return self.executions.update(&execution).await;
        }

        // The post-refresh retry is a handler invocation of its own, so
        // it counts as an attempt and shows up in the journal as one.
        execution.attempt_count += 1;
        self.executions.update(&execution).await?;

        match self.run_handler(handler, automation, &execution).await {
            Ok(result) => {
                execution.complete(result)?;
                self.executions.update(&execution).await
            }
            Err(e) => {
                self.report_auth(&automation.owner, service, &e.to_string()).await;
                self.dead_letter(execution, &e.to_string()).await
            }
        }
    }

    async fn retry_or_dead_letter(
        &self,
        mut execution: Execution,
        automation: &Automation,
        error: &str,
    ) -> DomainResult<()> {
        let max_attempts = self.max_attempts_for(automation);
        if execution.attempt_count >= max_attempts {
            return self.dead_letter(execution, error).await;
        }

        let delay = self.retry.delay_for(execution.attempt_count);
        execution.requeue(format!("Attempt {} failed: {error}", execution.attempt_count))?;
        self.executions.update(&execution).await?;
        tracing::info!(
            execution_id = %execution.id,
            attempt = execution.attempt_count,
            delay_secs = delay.as_secs(),
            "Requeueing execution after transient failure"
        );
        self.queue.enqueue_after(execution.id, delay);
        Ok(())
    }

    /// Terminal bucket for executions that exhausted their retry budget.
    async fn dead_letter(&self, mut execution: Execution, last_error: &str) -> DomainResult<()> {
        execution.fail(format!(
            "Moved to dead letter queue after {} failed attempts: {last_error}",
            execution.attempt_count
        ))?;
        self.executions.update(&execution).await?;
        self.alerts.dead_letter(&execution).await;
        Ok(())
    }

    async fn run_handler(
        &self,
        handler: &Arc<dyn ReactionHandler>,
        automation: &Automation,
        execution: &Execution,
    ) -> Result<serde_json::Value, HandlerError> {
        let timeout = Duration::from_secs(self.config.handler_timeout_seconds.max(1));
        match tokio::time::timeout(
            timeout,
            handler.handle(
                &automation.reaction_config,
                &execution.trigger_data,
                &automation.owner,
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HandlerError::Transient(format!(
                "handler '{}' exceeded the {}s timeout",
                automation.reaction_name, self.config.handler_timeout_seconds
            ))),
        }
    }

    /// Total attempt budget for an automation's reaction: configured
    /// retries plus the initial attempt.
    fn max_attempts_for(&self, automation: &Automation) -> u32 {
        let service = self
            .catalog
            .reaction(&automation.reaction_name)
            .map(|r| r.service)
            .unwrap_or_default();
        let retry_max = self
            .config
            .retry_max_per_service
            .get(service)
            .copied()
            .unwrap_or(self.config.default_retry_max);
        retry_max + 1
    }

    async fn report_auth(&self, owner: &str, service: &str, message: &str) {
        if let Err(e) = self
            .notifications
            .report(owner, service, NotificationKind::AuthError, message)
            .await
        {
            tracing::error!(error = %e, "Failed to record auth notification");
        }
    }

    /// Requeue running executions whose last update is older than the
    /// reclaim threshold. Run at boot and periodically; covers workers
    /// that died mid-execution.
    pub async fn reclaim_stale(&self) -> DomainResult<usize> {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.config.reclaim_running_after_seconds as i64);
        let stale = self.executions.list_stale_running(cutoff).await?;
        let mut reclaimed = 0;
        for mut execution in stale {
            execution.requeue("Reclaimed after stale running state")?;
            self.executions.update(&execution).await?;
            if self.queue.enqueue(execution.id).await {
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            tracing::info!(count = reclaimed, "Reclaimed stale running executions");
        }
        Ok(reclaimed)
    }

    /// Enqueue pending rows left over from a previous process lifetime.
    pub async fn enqueue_pending_backlog(&self) -> DomainResult<usize> {
        let pending = self
            .executions
            .list_by_status(ExecutionStatus::Pending, 10_000)
            .await?;
        let mut queued = 0;
        for execution in pending {
            if self.queue.enqueue(execution.id).await {
                queued += 1;
            }
        }
        if queued > 0 {
            tracing::info!(count = queued, "Enqueued pending execution backlog");
        }
        Ok(queued)
    }
}
