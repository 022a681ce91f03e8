//! Gmail plugin: send-email reaction.

pub mod reactions;

pub use reactions::SendEmailHandler;
