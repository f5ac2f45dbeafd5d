use crate::config::Config;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,account_store=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global tracing subscriber.
///
/// Local and test environments get human-readable output; production emits
/// Stackdriver-formatted JSON. Fails if a subscriber is already installed.
pub fn init_tracing(config: &Config) -> anyhow::Result<()> {
    if config.is_local() {
        // Local development: Pretty printing
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    } else {
        // Production: JSON logging for Cloud Logging
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_stackdriver::layer())
            .try_init()?;
    }

    Ok(())
}
