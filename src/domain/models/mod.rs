//! Domain models.

pub mod automation;
pub mod config;
pub mod execution;
pub mod notification;
pub mod schema;
pub mod service;
pub mod token;
pub mod trigger;
pub mod webhook;

pub use automation::{ActionState, Automation, AutomationStatus};
pub use config::Config;
pub use execution::{Execution, ExecutionStatus};
pub use notification::{NotificationKind, OAuthNotification};
pub use schema::{ConfigSchema, FieldShape, FieldSpec, FieldType};
pub use service::{ActionDef, ReactionDef, Service, ServiceStatus, TriggerChannel};
pub use token::ServiceToken;
pub use trigger::TriggerEvent;
pub use webhook::{WebhookSubscription, WebhookSubscriptionStatus};
