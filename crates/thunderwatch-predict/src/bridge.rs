//! Invocation of the external trained model.
//!
//! The model runs as a child process: features go in as one JSON line on
//! stdin, one JSON object comes back on stdout. Every invocation is bounded
//! by a deadline; on expiry the child's whole process group is killed and
//! the child reaped before the timeout is reported, so no partial result
//! and no worker started by the script outlives the call.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thunderwatch_core::{ModelConfig, ModelError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::features::{FeatureVector, FEATURE_NAMES};

pub const MODEL_TYPE: &str = "Random Forest ML Model (Trained)";

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw output of the trained model, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalResult {
    /// 0/1 or a boolean, depending on the model build
    #[serde(default)]
    pub prediction: Option<Value>,
    pub probability: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub alert: Option<String>,
    #[serde(default)]
    pub model_info: Option<Value>,
}

impl ExternalResult {
    pub fn prediction_flag(&self) -> Option<bool> {
        match self.prediction.as_ref()? {
            Value::Bool(flag) => Some(*flag),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        }
    }
}

/// Availability report for the model backend.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub model_version: String,
    pub interpreter: String,
    pub interpreter_available: bool,
    pub script_path: PathBuf,
    pub script_present: bool,
    pub artifact_path: PathBuf,
    pub artifact_present: bool,
    pub features: Vec<String>,
}

impl ModelStatus {
    pub fn is_ready(&self) -> bool {
        self.interpreter_available && self.script_present && self.artifact_present
    }
}

/// Backend that turns a feature vector into a raw model result.
pub trait ModelBridge: Send + Sync {
    fn invoke(
        &self,
        features: &FeatureVector,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExternalResult, ModelError>> + Send;

    fn status(&self) -> impl Future<Output = ModelStatus> + Send {
        std::future::ready(ModelStatus::default())
    }
}

/// Runs `interpreter script` inside the model directory.
#[derive(Debug, Clone)]
pub struct ProcessModelBridge {
    interpreter: String,
    model_dir: PathBuf,
    script: PathBuf,
    artifact: PathBuf,
    version: String,
}

impl ProcessModelBridge {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            model_dir: config.model_dir.clone(),
            script: config.script_path(),
            artifact: config.artifact_path(),
            version: config.version.clone(),
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    async fn precheck(&self) -> Result<(), ModelError> {
        if !exists(&self.script).await {
            return Err(ModelError::Unavailable(format!(
                "prediction script not found: {}",
                self.script.display()
            )));
        }
        if !exists(&self.artifact).await {
            return Err(ModelError::Unavailable(format!(
                "model artifact not found: {}",
                self.artifact.display()
            )));
        }
        Ok(())
    }

    async fn run(&self, payload: String, timeout: Duration) -> Result<String, ModelError> {
        let deadline = Instant::now() + timeout;

        // The script path may be relative to the working directory; the
        // child runs inside the model directory, so pass it absolute.
        let script = std::path::absolute(&self.script).unwrap_or_else(|_| self.script.clone());

        let mut command = Command::new(&self.interpreter);
        command
            .arg(&script)
            .current_dir(&self.model_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a timeout can take down anything the script forks.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| {
                ModelError::Unavailable(format!("failed to start {}: {}", self.interpreter, e))
            })?;
        let group = child.id();

        let mut stdin = child.stdin.take();
        let mut stdout_task = spawn_reader(child.stdout.take());
        let mut stderr_task = spawn_reader(child.stderr.take());

        let exchange = async {
            if let Some(mut pipe) = stdin.take() {
                if let Err(e) = pipe.write_all(payload.as_bytes()).await {
                    // The exit status decides; a model that ignores its
                    // input is not a failure by itself.
                    tracing::debug!("Model stdin closed early: {}", e);
                }
                drop(pipe);
            }
            let status = child.wait().await;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (status, stdout, stderr)
        };

        let (status, stdout, stderr) = match tokio::time::timeout_at(deadline, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                kill_process_group(group);
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed-out model process: {}", e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(ModelError::Timeout(timeout));
            }
        };

        let status = status.map_err(|e| ModelError::Process {
            code: None,
            stderr: format!("failed to wait for model process: {}", e),
        })?;

        if !status.success() {
            return Err(ModelError::Process {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

impl ModelBridge for ProcessModelBridge {
    async fn invoke(
        &self,
        features: &FeatureVector,
        timeout: Duration,
    ) -> Result<ExternalResult, ModelError> {
        self.precheck().await?;

        let mut payload = serde_json::to_string(features)
            .map_err(|e| ModelError::Unavailable(format!("cannot encode features: {}", e)))?;
        payload.push('\n');

        let started = Instant::now();
        let stdout = self.run(payload, timeout).await?;
        tracing::debug!("Model responded in {:?}", started.elapsed());

        parse_output(&stdout)
    }

    async fn status(&self) -> ModelStatus {
        ModelStatus {
            model_version: self.version.clone(),
            interpreter: self.interpreter.clone(),
            interpreter_available: interpreter_responds(&self.interpreter).await,
            script_path: self.script.clone(),
            script_present: exists(&self.script).await,
            artifact_path: self.artifact.clone(),
            artifact_present: exists(&self.artifact).await,
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Interpret the model's stdout. A JSON object with an `error` field is the
/// model reporting its own failure.
pub fn parse_output(stdout: &str) -> Result<ExternalResult, ModelError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ModelError::MalformedOutput("empty output".to_string()));
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ModelError::MalformedOutput(format!("invalid JSON: {}", e)))?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ModelError::Process {
            code: Some(0),
            stderr: message,
        });
    }

    serde_json::from_value(value)
        .map_err(|e| ModelError::MalformedOutput(format!("unexpected shape: {}", e)))
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                tracing::debug!("Model pipe read failed: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// SIGKILL the process group the model was spawned as leader of. The
/// group id stays reserved while any member is alive.
#[cfg(unix)]
fn kill_process_group(group: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!("Failed to kill model process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: Option<u32>) {}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn interpreter_responds(interpreter: &str) -> bool {
    let check = Command::new(interpreter)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(VERSION_CHECK_TIMEOUT, check).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            tracing::debug!("Interpreter {} unavailable: {}", interpreter, e);
            false
        }
        Err(_) => false,
    }
}
