pub mod config;
pub mod error;

pub use config::{CacheConfig, Config, LoggingConfig, ModelConfig, SimulatorConfig, ValidationResult};
pub use error::{AppError, ConfigError, FeatureError, ModelError, WeatherError};

use anyhow::Result;

/// Default log filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Initialize tracing/logging.
///
/// `RUST_LOG` wins over the filter passed in. Safe to call more than once;
/// only the first call installs the subscriber.
pub fn init(filter: Option<&str>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(filter.unwrap_or(DEFAULT_LOG_FILTER))
    });

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!("Thunderwatch core initialized");
    Ok(())
}
