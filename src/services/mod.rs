//! Engine services: trigger production, admission, dispatch, and the
//! supporting brokers and maintenance tasks.

pub mod admitter;
pub mod backoff;
pub mod catalog;
pub mod dispatcher;
pub mod metrics;
pub mod notifications;
pub mod poll_runner;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod token_broker;
pub mod webhook_ingest;
pub mod webhook_manager;

pub use admitter::ExecutionAdmitter;
pub use backoff::RetryPolicy;
pub use catalog::Catalog;
pub use dispatcher::{DispatchQueue, Dispatcher};
pub use metrics::MetricsCollector;
pub use notifications::NotificationService;
pub use poll_runner::{CycleStatus, CycleSummary, PollRunner};
pub use registry::HandlerRegistry;
pub use scheduler::{TickSummary, TimerScheduler};
pub use token_broker::TokenBroker;
pub use webhook_ingest::{WebhookIngest, WebhookOutcome};
pub use webhook_manager::WebhookSubscriptionManager;
pub use retention::RetentionTask;
