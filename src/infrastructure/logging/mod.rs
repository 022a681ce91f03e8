//! Tracing initialisation.

use tracing_subscriber::EnvFilter;

use crate::domain::models::config::LoggingConfig;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Safe to call once per
/// process; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("relay={},info", config.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already initialised");
    }
}
