//! SQLite persistence adapters.

pub mod action_state_repository;
pub mod automation_repository;
pub mod connection;
pub mod execution_repository;
pub mod migrations;
pub mod notification_repository;
pub mod service_repository;
pub mod token_repository;
pub mod webhook_subscription_repository;

pub use action_state_repository::SqliteActionStateRepository;
pub use automation_repository::SqliteAutomationRepository;
pub use connection::{create_pool, create_test_pool, PoolConfig};
pub use execution_repository::SqliteExecutionRepository;
pub use migrations::Migrator;
pub use notification_repository::SqliteNotificationRepository;
pub use service_repository::SqliteServiceRepository;
pub use token_repository::SqliteTokenRepository;
pub use webhook_subscription_repository::SqliteWebhookSubscriptionRepository;
