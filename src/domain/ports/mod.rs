//! Port traits.
//!
//! The engine interacts with storage and external systems exclusively
//! through these traits, keeping the domain layer decoupled from sqlite
//! and from any specific vendor API.

pub mod action_state_repository;
pub mod automation_repository;
pub mod execution_repository;
pub mod handler;
pub mod notification_repository;
pub mod poller;
pub mod provider;
pub mod service_repository;
pub mod sink;
pub mod token_repository;
pub mod webhook_registrar;
pub mod webhook_subscription_repository;

pub use action_state_repository::ActionStateRepository;
pub use automation_repository::AutomationRepository;
pub use execution_repository::ExecutionRepository;
pub use handler::{HandlerError, ReactionHandler};
pub use notification_repository::NotificationRepository;
pub use poller::{PolledItem, ServicePoller};
pub use provider::{OAuthProvider, RefreshedToken};
pub use service_repository::ServiceRepository;
pub use sink::{AlertSink, MetricsSink, MetricsSnapshot, StatusCounts, TracingSink};
pub use token_repository::{TokenRepository, TokenUpdate};
pub use webhook_registrar::WebhookRegistrar;
pub use webhook_subscription_repository::WebhookSubscriptionRepository;
