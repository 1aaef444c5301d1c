use std::path::{Path, PathBuf};

use anyhow::Result;
use thunderwatch_app::App;
use thunderwatch_core::{AppError, Config, ConfigError, ValidationResult};

fn load_config(path: Option<&Path>) -> Result<(Config, ValidationResult), AppError> {
    Config::load_validated(path).map_err(|e| match e.downcast::<ConfigError>() {
        Ok(config_err) => AppError::Config(config_err),
        Err(other) => AppError::Other(other),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional explicit config file; the user config dir otherwise
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, validation) = load_config(config_path.as_deref())
        .inspect_err(|e| eprintln!("{}: {}", e.user_message(), e))?;

    thunderwatch_core::init(Some(&config.logging.filter))?;

    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    let app = App::new(config);

    let status = app.orchestrator().model_status().await;
    if status.is_ready() {
        tracing::info!("Trained model {} ready", status.model_version);
    } else {
        tracing::warn!(
            interpreter = status.interpreter_available,
            script = status.script_present,
            artifact = status.artifact_present,
            "Trained model unavailable, predictions will use the rule-based fallback"
        );
    }

    for alert in app.simulator().active_alerts(app.store(), chrono::Utc::now()) {
        tracing::warn!("[{}] {}: {}", alert.severity, alert.location_name, alert.message);
    }

    for response in app.orchestrator().predict_all().await {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    app.start();
    tracing::info!("Thunderwatch running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    app.shutdown().await;

    Ok(())
}
