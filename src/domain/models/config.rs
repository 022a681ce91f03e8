//! Engine configuration tree.
//!
//! Loaded by the figment-based loader in `infrastructure::config`;
//! defaults here are the programmatic base layer of the merge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub dispatcher: DispatcherConfig,
    pub scheduler: SchedulerConfig,
    pub polling: PollingConfig,
    pub token_broker: TokenBrokerConfig,
    pub retention: RetentionConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    /// Shared webhook secrets, keyed by service name.
    pub webhook_secrets: HashMap<String, String>,
    /// OAuth provider credentials, keyed by service name.
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            http: HttpConfig::default(),
            dispatcher: DispatcherConfig::default(),
            scheduler: SchedulerConfig::default(),
            polling: PollingConfig::default(),
            token_broker: TokenBrokerConfig::default(),
            retention: RetentionConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
            webhook_secrets: HashMap::new(),
            providers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "relay.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used when registering webhooks
    /// upstream. Falls back to `http://{host}:{port}`.
    pub public_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_url: None,
        }
    }
}

impl HttpConfig {
    pub fn public_base(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of dispatch workers.
    pub worker_count: usize,
    /// Retry attempts for recoverable failures (total attempts = max + 1).
    pub default_retry_max: u32,
    /// Initial backoff between attempts.
    pub retry_base_seconds: u64,
    /// Backoff ceiling.
    pub retry_cap_seconds: u64,
    /// Hard timeout per handler invocation.
    pub handler_timeout_seconds: u64,
    /// Running executions older than this are requeued by the reclaim sweep.
    pub reclaim_running_after_seconds: u64,
    /// Bound of the in-process dispatch queue.
    pub queue_capacity: usize,
    /// Per-service overrides of `default_retry_max`.
    pub retry_max_per_service: HashMap<String, u32>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            default_retry_max: 3,
            retry_base_seconds: 60,
            retry_cap_seconds: 900,
            handler_timeout_seconds: 30,
            reclaim_running_after_seconds: 600,
            queue_capacity: 1024,
            retry_max_per_service: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Disable the minute-boundary timer loop (tests drive ticks directly).
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Default poll cadence for services without an override.
    pub poll_interval_seconds: u64,
    /// Per-service cadence overrides.
    pub intervals: HashMap<String, u64>,
    /// Retry budget for transient upstream failures within one cycle.
    pub transient_retry_budget: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 120,
            intervals: HashMap::new(),
            transient_retry_budget: 3,
        }
    }
}

impl PollingConfig {
    pub fn interval_for(&self, service: &str) -> u64 {
        self.intervals
            .get(service)
            .copied()
            .unwrap_or(self.poll_interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBrokerConfig {
    /// Proactive refresh window before expiry.
    pub token_refresh_window_seconds: u64,
}

impl Default for TokenBrokerConfig {
    fn default() -> Self {
        Self {
            token_refresh_window_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub retention_success_days: u32,
    pub retention_failed_days: u32,
    pub sweep_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_success_days: 30,
            retention_failed_days: 90,
            sweep_interval_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub interval_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_seconds: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// OAuth client credentials for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Override of the provider's token endpoint (used by tests).
    pub token_url: Option<String>,
}
