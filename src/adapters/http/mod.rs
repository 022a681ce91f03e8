//! Inbound HTTP surface: webhook receivers and service discovery.

pub mod extract;
pub mod server;
pub mod signature;

pub use server::{router, serve, AppState};
