//! Hierarchical configuration loading.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid worker_count: {0}. Must be between 1 and 256")]
    InvalidWorkerCount(usize),

    #[error("Invalid queue_capacity: {0}. Must be at least 1")]
    InvalidQueueCapacity(usize),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error(
        "Invalid backoff configuration: retry_base_seconds ({0}) must not exceed retry_cap_seconds ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid handler_timeout_seconds: {0}. Must be at least 1")]
    InvalidHandlerTimeout(u64),

    #[error("Invalid poll_interval_seconds: {0}. Must be at least 10")]
    InvalidPollInterval(u64),
}

/// Loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `relay.yaml` (project config)
    /// 3. `relay.local.yaml` (local overrides, optional)
    /// 4. Environment variables (`RELAY_*` prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("relay.yaml"))
            .merge(Yaml::file("relay.local.yaml"))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .context("Failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.dispatcher.worker_count == 0 || config.dispatcher.worker_count > 256 {
            return Err(ConfigError::InvalidWorkerCount(config.dispatcher.worker_count));
        }
        if config.dispatcher.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(config.dispatcher.queue_capacity));
        }
        if config.dispatcher.retry_base_seconds > config.dispatcher.retry_cap_seconds {
            return Err(ConfigError::InvalidBackoff(
                config.dispatcher.retry_base_seconds,
                config.dispatcher.retry_cap_seconds,
            ));
        }
        if config.dispatcher.handler_timeout_seconds == 0 {
            return Err(ConfigError::InvalidHandlerTimeout(
                config.dispatcher.handler_timeout_seconds,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.polling.poll_interval_seconds < 10 {
            return Err(ConfigError::InvalidPollInterval(config.polling.poll_interval_seconds));
        }
        for (_, interval) in config.polling.intervals.iter() {
            if *interval < 10 {
                return Err(ConfigError::InvalidPollInterval(*interval));
            }
        }

        Ok(())
    }
}
