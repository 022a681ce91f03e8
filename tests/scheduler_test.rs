mod helpers;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use relay::domain::models::{Automation, AutomationStatus, ExecutionStatus};
use relay::domain::ports::ExecutionRepository;
use relay::services::{DispatchQueue, ExecutionAdmitter, TimerScheduler};

use helpers::database::{automation_repo, execution_repo, insert_automation, setup_test_db};

fn scheduler(pool: &sqlx::SqlitePool) -> TimerScheduler {
    let (queue, _rx) = DispatchQueue::bounded(32);
    let admitter = Arc::new(ExecutionAdmitter::new(execution_repo(pool), queue));
    TimerScheduler::new(automation_repo(pool), admitter)
}

#[tokio::test]
async fn test_daily_timer_fires_at_configured_minute() {
    let pool = setup_test_db().await;
    let automation = insert_automation(
        &pool,
        Automation::new("u", "Daily digest", "timer_daily", "send_email")
            .with_action_config(json!({"hour": 14, "minute": 30}))
            .with_reaction_config(json!({
                "recipient": "u@x.io", "subject": "Hi", "body": "Hello"
            })),
    )
    .await;

    let scheduler = scheduler(&pool);
    let tick_time = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();

    let summary = scheduler.tick(tick_time).await.expect("tick failed");
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 0);

    let executions = execution_repo(&pool)
        .list_by_status(ExecutionStatus::Pending, 10)
        .await
        .expect("list failed");
    assert_eq!(executions.len(), 1);
    assert_eq!(
        executions[0].external_event_id,
        format!("timer_{}_202401151430", automation.id)
    );
}

#[tokio::test]
async fn test_two_ticks_at_same_minute_create_one_execution() {
    let pool = setup_test_db().await;
    insert_automation(
        &pool,
        Automation::new("u", "Daily", "timer_daily", "log_message")
            .with_action_config(json!({"hour": 14, "minute": 30}))
            .with_reaction_config(json!({"message": "hi"})),
    )
    .await;

    let scheduler = scheduler(&pool);
    let tick_time = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();

    let first = scheduler.tick(tick_time).await.expect("tick failed");
    assert_eq!(first.created, 1);

    // Same minute observed again, e.g. two scheduler replicas.
    let second = scheduler.tick(tick_time).await.expect("tick failed");
    assert_eq!(second.matched, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);

    let executions = execution_repo(&pool)
        .list_by_status(ExecutionStatus::Pending, 10)
        .await
        .expect("list failed");
    assert_eq!(executions.len(), 1);
}

#[tokio::test]
async fn test_next_day_same_minute_creates_new_execution() {
    let pool = setup_test_db().await;
    insert_automation(
        &pool,
        Automation::new("u", "Daily", "timer_daily", "log_message")
            .with_action_config(json!({"hour": 14, "minute": 30}))
            .with_reaction_config(json!({"message": "hi"})),
    )
    .await;

    let scheduler = scheduler(&pool);
    let day1 = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap();

    assert_eq!(scheduler.tick(day1).await.expect("tick failed").created, 1);
    assert_eq!(scheduler.tick(day2).await.expect("tick failed").created, 1);
}

#[tokio::test]
async fn test_weekly_timer_only_fires_on_configured_day() {
    let pool = setup_test_db().await;
    insert_automation(
        &pool,
        Automation::new("u", "Weekly", "timer_weekly", "log_message")
            // Monday.
            .with_action_config(json!({"day_of_week": 0, "hour": 10, "minute": 0}))
            .with_reaction_config(json!({"message": "hi"})),
    )
    .await;

    let scheduler = scheduler(&pool);
    // 2024-01-15 is a Monday, 2024-01-16 a Tuesday.
    let monday = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let tuesday = Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap();

    assert_eq!(scheduler.tick(monday).await.expect("tick failed").created, 1);
    let off_day = scheduler.tick(tuesday).await.expect("tick failed");
    assert_eq!(off_day.matched, 0);
    assert_eq!(off_day.created, 0);
}

#[tokio::test]
async fn test_malformed_config_is_skipped_not_fatal() {
    let pool = setup_test_db().await;
    insert_automation(
        &pool,
        Automation::new("u", "Broken", "timer_daily", "log_message")
            .with_action_config(json!({"hour": 99, "minute": 0}))
            .with_reaction_config(json!({"message": "hi"})),
    )
    .await;
    insert_automation(
        &pool,
        Automation::new("u", "Fine", "timer_daily", "log_message")
            .with_action_config(json!({"hour": 8, "minute": 0}))
            .with_reaction_config(json!({"message": "hi"})),
    )
    .await;

    let scheduler = scheduler(&pool);
    let summary = scheduler
        .tick(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap())
        .await
        .expect("tick failed");

    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.created, 1);
}

#[tokio::test]
async fn test_inactive_automations_do_not_fire() {
    let pool = setup_test_db().await;
    insert_automation(
        &pool,
        Automation::new("u", "Off", "timer_daily", "log_message")
            .with_action_config(json!({"hour": 9, "minute": 0}))
            .with_reaction_config(json!({"message": "hi"}))
            .with_status(AutomationStatus::Disabled),
    )
    .await;

    let scheduler = scheduler(&pool);
    let summary = scheduler
        .tick(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())
        .await
        .expect("tick failed");
    assert_eq!(summary.matched, 0);
    assert_eq!(summary.created, 0);
}
