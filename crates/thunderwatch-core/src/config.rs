use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Weather simulator settings
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Per-station prediction cache
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External trained model (invoked as `interpreter script` inside `model_dir`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Interpreter used to run the prediction script
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directory holding the script and the trained artifact
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Prediction script, relative to `model_dir`
    #[serde(default = "default_script")]
    pub script: String,

    /// Trained model artifact, relative to `model_dir`
    #[serde(default = "default_artifact")]
    pub artifact: String,

    /// Hard limit for one model invocation
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_model_version")]
    pub version: String,
}

fn default_interpreter() -> String {
    std::env::var("PYTHON_PATH").unwrap_or_else(|_| "python3".to_string())
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("Model")
}

fn default_script() -> String {
    "predict_api.py".to_string()
}

fn default_artifact() -> String {
    "thunderstorm_model.joblib".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_model_version() -> String {
    "1.0.0".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            model_dir: default_model_dir(),
            script: default_script(),
            artifact: default_artifact(),
            timeout_ms: default_timeout_ms(),
            version: default_model_version(),
        }
    }
}

impl ModelConfig {
    pub fn script_path(&self) -> PathBuf {
        self.model_dir.join(&self.script)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.model_dir.join(&self.artifact)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Period of the risk drift task in seconds (default: 120)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Chance per station per tick that its risk level moves one step
    #[serde(default = "default_drift_probability")]
    pub drift_probability: f64,

    /// Fixed RNG seed for reproducible runs; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tick_interval() -> u64 {
    120
}

fn default_drift_probability() -> f64 {
    0.05
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            drift_probability: default_drift_probability(),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Time-to-live of a cached station prediction
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing-subscriber filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    crate::DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            simulator: SimulatorConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the user config directory, creating a default
    /// file if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings, which the
    /// caller logs once its subscriber is installed.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.model.interpreter.trim().is_empty() {
            result.add_error("model.interpreter", "Interpreter must not be empty");
        }

        if self.model.timeout_ms == 0 {
            result.add_error("model.timeout_ms", "Timeout must be greater than 0");
        } else if self.model.timeout_ms > 120_000 {
            result.add_warning(
                "model.timeout_ms",
                "Timeout is more than 2 minutes; slow models delay every fallback",
            );
        }

        let script = self.model.script_path();
        if !script.exists() {
            result.add_warning(
                "model.script",
                format!(
                    "Script not found: {} (rule-based fallback will be used)",
                    script.display()
                ),
            );
        }

        let artifact = self.model.artifact_path();
        if !artifact.exists() {
            result.add_warning(
                "model.artifact",
                format!(
                    "Model artifact not found: {} (rule-based fallback will be used)",
                    artifact.display()
                ),
            );
        }

        if !(0.0..=1.0).contains(&self.simulator.drift_probability) {
            result.add_error(
                "simulator.drift_probability",
                "Drift probability must be between 0 and 1",
            );
        }

        if self.simulator.tick_interval_secs == 0 {
            result.add_error(
                "simulator.tick_interval_secs",
                "Tick interval must be greater than 0",
            );
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            result.add_warning("cache.ttl_secs", "Cache enabled with a zero TTL never hits");
        }

        result
    }

    /// Save configuration to the given file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("thunderwatch");

        Ok(config_dir.join("config.toml"))
    }
}
