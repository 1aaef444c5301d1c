//! Centralized error types for Thunderwatch.
//!
//! This module provides a typed error hierarchy that:
//! - Separates caller-visible failures (unknown station, bad request) from
//!   model failures that are contained by the fallback path
//! - Provides user-friendly messages suitable for API responses
//! - Preserves full error context for logging

use std::time::Duration;

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a caller-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for an API response.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Weather(e) => e.user_message(),
            AppError::Model(e) => e.user_message(),
            AppError::Feature(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Station and simulator errors.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Location {0} not found")]
    StationNotFound(String),

    #[error("Invalid date range: end date {end} is before start date {start}")]
    InvalidRange { start: String, end: String },

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::StationNotFound(_) => "Location not found. Check the identifier.",
            WeatherError::InvalidRange { .. } => "The end date must not be before the start date.",
            WeatherError::InvalidDate(_) => "Dates must use the YYYY-MM-DD format.",
        }
    }
}

/// External model invocation errors.
///
/// All variants are contained by the orchestrator and turned into a
/// rule-based fallback result.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model process failed (exit code {code:?}): {stderr}")]
    Process { code: Option<i32>, stderr: String },

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Model timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ModelError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ModelError::Unavailable(_) => "The trained model is not installed.",
            ModelError::Process { .. } => "The trained model failed to run.",
            ModelError::MalformedOutput(_) => "The trained model returned an unreadable result.",
            ModelError::Timeout(_) => "The trained model took too long to respond.",
        }
    }

    /// Short machine-readable tag, used in logs and fallback metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Unavailable(_) => "unavailable",
            ModelError::Process { .. } => "process",
            ModelError::MalformedOutput(_) => "malformed_output",
            ModelError::Timeout(_) => "timeout",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ModelError::Timeout(_))
    }
}

/// Feature vector validation errors (caller-facing).
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Missing required parameters: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Parameter {0} must be a finite number")]
    NotNumeric(String),

    #[error("Request body must be a JSON object")]
    NotAnObject,
}

impl FeatureError {
    pub fn user_message(&self) -> &'static str {
        match self {
            FeatureError::Missing(_) => "Some required parameters are missing.",
            FeatureError::NotNumeric(_) => "All parameters must be numbers.",
            FeatureError::NotAnObject => "The request must be a JSON object.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let err: AppError = WeatherError::StationNotFound("atlantis".into()).into();
        assert!(matches!(err, AppError::Weather(WeatherError::StationNotFound(_))));
    }

    #[test]
    fn test_user_message_propagation() {
        let err = AppError::Model(ModelError::Timeout(Duration::from_millis(15_000)));
        assert_eq!(err.user_message(), "The trained model took too long to respond.");
    }

    #[test]
    fn test_station_not_found_message() {
        let err = WeatherError::StationNotFound("nonexistent".into());
        assert_eq!(err.to_string(), "Location nonexistent not found");
    }

    #[test]
    fn test_missing_features_enumerates_names() {
        let err = FeatureError::Missing(vec!["CAPE_Jkg".into(), "K_index".into()]);
        assert_eq!(err.to_string(), "Missing required parameters: CAPE_Jkg, K_index");
    }

    #[test]
    fn test_model_error_kinds() {
        assert!(ModelError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(!ModelError::Unavailable("x".into()).is_timeout());
        assert_eq!(ModelError::MalformedOutput("x".into()).kind(), "malformed_output");
        assert_eq!(
            ModelError::Process { code: Some(2), stderr: "boom".into() }.kind(),
            "process"
        );
    }

    #[test]
    fn test_timeout_display_in_millis() {
        let err = ModelError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Model timed out after 250ms");
    }
}
