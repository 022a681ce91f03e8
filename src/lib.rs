//! Relay is an action-reaction automation engine.
//!
//! Users pair an action (a trigger in one service) with a reaction (an
//! effect in another). The engine converts timer ticks, poll results,
//! and inbound webhooks into uniform trigger events, admits at most one
//! execution per logical event, and dispatches reactions through a
//! retrying worker pool with dead-lettering. Outbound calls draw
//! credentials from a token broker that refreshes proactively.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::{DomainError, DomainResult};
