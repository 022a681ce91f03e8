mod helpers;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use relay::domain::models::config::DispatcherConfig;
use relay::domain::models::{
    Automation, Execution, ExecutionStatus, NotificationKind, ServiceToken,
};
use relay::domain::ports::{
    ExecutionRepository, HandlerError, NotificationRepository, OAuthProvider, ReactionHandler,
    RefreshedToken, TokenRepository, TracingSink,
};
use relay::services::{DispatchQueue, Dispatcher, HandlerRegistry, NotificationService, TokenBroker};
use relay::DomainResult;

use helpers::database::{
    automation_repo, execution_repo, insert_automation, notification_repo, setup_test_db,
    token_repo,
};

// ── scripted handlers ───────────────────────────────────────────────────────

struct CountingHandler {
    name: &'static str,
    calls: Arc<AtomicU32>,
    /// Result per call index (0-based); the last entry repeats.
    script: Vec<Result<Value, fn(String) -> HandlerError>>,
}

#[async_trait]
impl ReactionHandler for CountingHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, _: &Value, _: &Value, _: &str) -> Result<Value, HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let step = self.script.get(call).or_else(|| self.script.last());
        match step {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(make)) => Err(make(format!("scripted failure on call {call}"))),
            None => Ok(Value::Null),
        }
    }
}

struct SlowHandler;

#[async_trait]
impl ReactionHandler for SlowHandler {
    fn name(&self) -> &'static str {
        "slow_reaction"
    }

    async fn handle(&self, _: &Value, _: &Value, _: &str) -> Result<Value, HandlerError> {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok(json!({"too": "late"}))
    }
}

struct MockGmailProvider {
    refreshes: Arc<AtomicU32>,
}

#[async_trait]
impl OAuthProvider for MockGmailProvider {
    fn service(&self) -> &'static str {
        "gmail"
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh(&self, _refresh_token: &str) -> DomainResult<RefreshedToken> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(RefreshedToken {
            access_token: "fresh-token".to_string(),
            expires_in_seconds: Some(3600),
            refresh_token: None,
        })
    }
}

// ── harness ─────────────────────────────────────────────────────────────────

struct Harness {
    pool: sqlx::SqlitePool,
    dispatcher: Arc<Dispatcher>,
    queue_rx: tokio::sync::mpsc::Receiver<relay::services::dispatcher::DispatchJob>,
    notifications: Arc<dyn NotificationRepository>,
}

async fn harness_with(
    handlers: Vec<Arc<dyn ReactionHandler>>,
    providers: Vec<Arc<dyn OAuthProvider>>,
    config: DispatcherConfig,
) -> Harness {
    let pool = setup_test_db().await;
    let executions = execution_repo(&pool);
    let automations = automation_repo(&pool);
    let notification_repo_arc = notification_repo(&pool);
    let notifications = Arc::new(NotificationService::new(notification_repo_arc.clone()));
    let broker = Arc::new(TokenBroker::new(
        token_repo(&pool),
        providers,
        notifications.clone(),
        300,
    ));

    let mut registry = HandlerRegistry::new();
    for handler in handlers {
        registry.register(handler);
    }

    let (queue, queue_rx) = DispatchQueue::bounded(64);
    let dispatcher = Arc::new(Dispatcher::new(
        executions,
        automations,
        Arc::new(registry),
        broker,
        notifications,
        Arc::new(TracingSink),
        config,
        queue,
    ));

    Harness {
        pool,
        dispatcher,
        queue_rx,
        notifications: notification_repo_arc,
    }
}

fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        retry_base_seconds: 0,
        retry_cap_seconds: 0,
        handler_timeout_seconds: 1,
        ..Default::default()
    }
}

async fn pending_execution(pool: &sqlx::SqlitePool, reaction: &str) -> Execution {
    let automation = insert_automation(
        pool,
        Automation::new("u", "A", "timer_daily", reaction).with_reaction_config(json!({})),
    )
    .await;
    let execution = Execution::new(automation.id, "evt-1", json!({"service": "timer"}));
    execution_repo(pool).insert(&execution).await.expect("insert failed");
    execution
}

// ── tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_execution_stores_result() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = Arc::new(CountingHandler {
        name: "ok_reaction",
        calls: calls.clone(),
        script: vec![Ok(json!({"delivered": true}))],
    });
    let h = harness_with(vec![handler], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "ok_reaction").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.result_data, Some(json!({"delivered": true})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_reaction_succeeds_with_note() {
    let h = harness_with(vec![], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "not_deployed_yet").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Success);
    let note = stored.result_data.expect("missing note")["note"]
        .as_str()
        .expect("note not a string")
        .to_string();
    assert!(note.contains("not_deployed_yet"));
    assert!(note.contains("not implemented"));
}

#[tokio::test]
async fn test_invalid_config_fails_without_retry() {
    let handler = Arc::new(CountingHandler {
        name: "bad_config",
        calls: Arc::new(AtomicU32::new(0)),
        script: vec![Err(HandlerError::InvalidConfig as fn(String) -> HandlerError)],
    });
    let h = harness_with(vec![handler], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "bad_config").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert_eq!(stored.attempt_count, 1);
    assert!(stored.error_message.expect("no error").contains("Invalid config"));
}

#[tokio::test]
async fn test_transient_failures_retry_then_dead_letter() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = Arc::new(CountingHandler {
        name: "always_transient",
        calls: calls.clone(),
        script: vec![Err(HandlerError::Transient as fn(String) -> HandlerError)],
    });
    let h = harness_with(vec![handler], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "always_transient").await;

    // default_retry_max = 3, so attempts 1..=3 requeue and attempt 4
    // dead-letters.
    for attempt in 1..=4u32 {
        h.dispatcher.process_execution(execution.id).await.expect("process failed");
        let stored = execution_repo(&h.pool)
            .get(execution.id)
            .await
            .expect("get failed")
            .expect("missing");
        assert_eq!(stored.attempt_count, attempt);
        if attempt < 4 {
            assert_eq!(stored.status, ExecutionStatus::Pending);
            assert!(stored
                .error_message
                .as_deref()
                .expect("no error")
                .contains(&format!("Attempt {attempt} failed")));
        }
    }

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert_eq!(stored.attempt_count, 4);
    assert!(stored
        .error_message
        .expect("no error")
        .contains("Moved to dead letter queue after 4 failed attempts"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_recovery_after_one_transient_failure() {
    let handler = Arc::new(CountingHandler {
        name: "flaky",
        calls: Arc::new(AtomicU32::new(0)),
        script: vec![
            Err(HandlerError::Transient as fn(String) -> HandlerError),
            Ok(json!({"recovered": true})),
        ],
    });
    let h = harness_with(vec![handler], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "flaky").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");
    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert_eq!(stored.attempt_count, 2);
}

#[tokio::test]
async fn test_handler_timeout_is_transient() {
    let h = harness_with(vec![Arc::new(SlowHandler)], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "slow_reaction").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Pending);
    assert!(stored.error_message.expect("no error").contains("Attempt 1 failed"));
}

#[tokio::test]
async fn test_auth_error_refreshes_and_retries_once() {
    let calls = Arc::new(AtomicU32::new(0));
    // First call 401s, the retry after refresh succeeds. Registered
    // under `send_email` so the catalog resolves the gmail service.
    let handler = Arc::new(CountingHandler {
        name: "send_email",
        calls: calls.clone(),
        script: vec![
            Err(HandlerError::Auth as fn(String) -> HandlerError),
            Ok(json!({"sent": true})),
        ],
    });
    let refreshes = Arc::new(AtomicU32::new(0));
    let provider = Arc::new(MockGmailProvider { refreshes: refreshes.clone() });
    let h = harness_with(vec![handler], vec![provider], fast_config()).await;

    // The owner holds a refreshable gmail token.
    token_repo(&h.pool)
        .upsert(
            &ServiceToken::new("u", "gmail", "stale-token")
                .with_refresh_token("refresh-1")
                .with_expires_at(chrono::Utc::now() + chrono::Duration::hours(1)),
        )
        .await
        .expect("token upsert failed");

    let execution = pending_execution(&h.pool, "send_email").await;
    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // The post-refresh retry counts as its own attempt.
    assert_eq!(stored.attempt_count, 2);
}

#[tokio::test]
async fn test_auth_error_with_failing_retry_goes_to_dead_letter() {
    let calls = Arc::new(AtomicU32::new(0));
    // The refresh succeeds, but the retried call still fails.
    let handler = Arc::new(CountingHandler {
        name: "send_email",
        calls: calls.clone(),
        script: vec![
            Err(HandlerError::Auth as fn(String) -> HandlerError),
            Err(HandlerError::Transient as fn(String) -> HandlerError),
        ],
    });
    let refreshes = Arc::new(AtomicU32::new(0));
    let provider = Arc::new(MockGmailProvider { refreshes: refreshes.clone() });
    let h = harness_with(vec![handler], vec![provider], fast_config()).await;

    token_repo(&h.pool)
        .upsert(
            &ServiceToken::new("u", "gmail", "stale-token")
                .with_refresh_token("refresh-1")
                .with_expires_at(chrono::Utc::now() + chrono::Duration::hours(1)),
        )
        .await
        .expect("token upsert failed");

    let execution = pending_execution(&h.pool, "send_email").await;
    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert_eq!(stored.attempt_count, 2);
    assert!(stored
        .error_message
        .expect("no error")
        .contains("Moved to dead letter queue after 2 failed attempts"));

    let open = h
        .notifications
        .find_open("u", "gmail", NotificationKind::AuthError)
        .await
        .expect("lookup failed");
    assert!(open.is_some());
}

#[tokio::test]
async fn test_auth_error_without_refresh_fails_and_notifies() {
    let handler = Arc::new(CountingHandler {
        name: "send_email",
        calls: Arc::new(AtomicU32::new(0)),
        script: vec![Err(HandlerError::Auth as fn(String) -> HandlerError)],
    });
    // No providers and no token: refresh is impossible.
    let h = harness_with(vec![handler], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "send_email").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert!(stored.error_message.expect("no error").contains("Authorization failed"));

    let open = h
        .notifications
        .find_open("u", "gmail", NotificationKind::AuthError)
        .await
        .expect("lookup failed");
    assert!(open.is_some());
}

#[tokio::test]
async fn test_per_service_retry_override() {
    let handler = Arc::new(CountingHandler {
        name: "send_email",
        calls: Arc::new(AtomicU32::new(0)),
        script: vec![Err(HandlerError::Transient as fn(String) -> HandlerError)],
    });
    let mut config = fast_config();
    config.retry_max_per_service.insert("gmail".to_string(), 0);
    let h = harness_with(vec![handler], vec![], config).await;
    let execution = pending_execution(&h.pool, "send_email").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert!(stored
        .error_message
        .expect("no error")
        .contains("Moved to dead letter queue after 1 failed attempts"));
}

#[tokio::test]
async fn test_redelivery_of_completed_execution_is_ignored() {
    let calls = Arc::new(AtomicU32::new(0));
    let handler = Arc::new(CountingHandler {
        name: "ok_reaction",
        calls: calls.clone(),
        script: vec![Ok(json!({}))],
    });
    let h = harness_with(vec![handler], vec![], fast_config()).await;
    let execution = pending_execution(&h.pool, "ok_reaction").await;

    h.dispatcher.process_execution(execution.id).await.expect("process failed");
    // The queue may deliver the same job again.
    h.dispatcher.process_execution(execution.id).await.expect("process failed");

    let stored = execution_repo(&h.pool)
        .get(execution.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_row_acknowledged_silently() {
    let h = harness_with(vec![], vec![], fast_config()).await;
    h.dispatcher
        .process_execution(uuid::Uuid::new_v4())
        .await
        .expect("missing row must not error");
}

#[tokio::test]
async fn test_worker_pool_processes_queued_jobs_and_drains() {
    let pool = setup_test_db().await;
    let executions = execution_repo(&pool);
    let automations = automation_repo(&pool);
    let notifications = Arc::new(NotificationService::new(notification_repo(&pool)));
    let broker = Arc::new(TokenBroker::new(token_repo(&pool), vec![], notifications.clone(), 300));

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(CountingHandler {
        name: "ok_reaction",
        calls: Arc::new(AtomicU32::new(0)),
        script: vec![Ok(json!({"done": true}))],
    }));

    let (queue, queue_rx) = DispatchQueue::bounded(8);
    let dispatcher = Arc::new(Dispatcher::new(
        executions.clone(),
        automations,
        Arc::new(registry),
        broker,
        notifications,
        Arc::new(TracingSink),
        fast_config(),
        queue.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let workers = dispatcher.spawn_workers(queue_rx, shutdown_rx);

    let execution = pending_execution(&pool, "ok_reaction").await;
    assert!(queue.enqueue(execution.id).await);

    // Wait for a worker to pick it up and finish.
    let mut done = false;
    for _ in 0..100 {
        let stored = executions
            .get(execution.id)
            .await
            .expect("get failed")
            .expect("missing");
        if stored.status == ExecutionStatus::Success {
            done = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(done, "worker pool never completed the execution");

    shutdown_tx.send(true).expect("shutdown signal failed");
    for worker in workers {
        tokio::time::timeout(std::time::Duration::from_secs(2), worker)
            .await
            .expect("worker did not drain")
            .expect("worker panicked");
    }
}

#[tokio::test]
async fn test_reclaim_stale_running() {
    let mut h = harness_with(vec![], vec![], fast_config()).await;
    let automation = insert_automation(
        &h.pool,
        Automation::new("u", "A", "timer_daily", "log_message"),
    )
    .await;

    let mut stranded = Execution::new(automation.id, "stranded", json!({}));
    stranded.begin_attempt().expect("transition failed");
    stranded.updated_at = chrono::Utc::now() - chrono::Duration::hours(1);
    execution_repo(&h.pool).insert(&stranded).await.expect("insert failed");

    let reclaimed = h.dispatcher.reclaim_stale().await.expect("reclaim failed");
    assert_eq!(reclaimed, 1);

    let stored = execution_repo(&h.pool)
        .get(stranded.id)
        .await
        .expect("get failed")
        .expect("missing");
    assert_eq!(stored.status, ExecutionStatus::Pending);

    let job = h.queue_rx.recv().await.expect("no job requeued");
    assert_eq!(job.execution_id, stranded.id);
}

#[tokio::test]
async fn test_enqueue_pending_backlog() {
    let mut h = harness_with(vec![], vec![], fast_config()).await;
    let automation = insert_automation(
        &h.pool,
        Automation::new("u", "A", "timer_daily", "log_message"),
    )
    .await;

    for i in 0..3 {
        execution_repo(&h.pool)
            .insert(&Execution::new(automation.id, format!("evt-{i}"), json!({})))
            .await
            .expect("insert failed");
    }

    let queued = h.dispatcher.enqueue_pending_backlog().await.expect("backlog failed");
    assert_eq!(queued, 3);
    for _ in 0..3 {
        assert!(h.queue_rx.recv().await.is_some());
    }
}
