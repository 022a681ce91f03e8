//! Shared test database setup.

use std::sync::Arc;

use sqlx::SqlitePool;

use relay::adapters::sqlite::{
    create_test_pool, Migrator, SqliteAutomationRepository, SqliteExecutionRepository,
    SqliteNotificationRepository, SqliteServiceRepository, SqliteTokenRepository,
    SqliteWebhookSubscriptionRepository,
};
use relay::domain::models::{Automation, Service};
use relay::domain::ports::{AutomationRepository, ServiceRepository};
use relay::services::Catalog;

/// Fresh in-memory database with the full schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = create_test_pool().await.expect("failed to create test pool");
    Migrator::new(pool.clone())
        .run()
        .await
        .expect("failed to run migrations");
    pool
}

/// Seed the services table from the built-in catalog.
pub async fn seed_services(pool: &SqlitePool) {
    let services = SqliteServiceRepository::new(pool.clone());
    for def in Catalog::builtin().services() {
        services
            .seed(&Service::new(def.name, def.description))
            .await
            .expect("failed to seed service");
    }
}

/// Persist an automation and return it.
pub async fn insert_automation(pool: &SqlitePool, automation: Automation) -> Automation {
    let repo = SqliteAutomationRepository::new(pool.clone());
    repo.create(&automation).await.expect("failed to insert automation");
    automation
}

pub fn execution_repo(pool: &SqlitePool) -> Arc<SqliteExecutionRepository> {
    Arc::new(SqliteExecutionRepository::new(pool.clone()))
}

pub fn automation_repo(pool: &SqlitePool) -> Arc<SqliteAutomationRepository> {
    Arc::new(SqliteAutomationRepository::new(pool.clone()))
}

pub fn token_repo(pool: &SqlitePool) -> Arc<SqliteTokenRepository> {
    Arc::new(SqliteTokenRepository::new(pool.clone()))
}

pub fn notification_repo(pool: &SqlitePool) -> Arc<SqliteNotificationRepository> {
    Arc::new(SqliteNotificationRepository::new(pool.clone()))
}

pub fn subscription_repo(pool: &SqlitePool) -> Arc<SqliteWebhookSubscriptionRepository> {
    Arc::new(SqliteWebhookSubscriptionRepository::new(pool.clone()))
}
