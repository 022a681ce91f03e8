//! Command-line interface.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Action-reaction automation engine")]
pub struct Cli {
    /// Path to a config file (defaults to relay.yaml in the working
    /// directory, plus RELAY_* environment overrides).
    #[arg(long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the engine: scheduler, pollers, dispatcher, and HTTP surface.
    Serve,
    /// Apply database migrations and seed the service table, then exit.
    Migrate,
    /// Print execution counts for the trailing hour and day, then exit.
    Status,
}
