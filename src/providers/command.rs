//! Provider backed by a local CLI.

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;

use super::base::{decode_outcome, truncate, ProviderAdapter};
use crate::types::config::ProviderConfig;
use crate::types::requests::Task;
use crate::types::responses::{ErrorKind, Outcome};

/// Invokes a remote function through a vendor CLI (e.g. `aws lambda invoke`).
///
/// The task's wire JSON is appended as the last argument; the function
/// response is read from stdout.
pub struct CommandProvider {
    id: String,
    command_name: String,
    args: Vec<String>,
    payload_field: Option<String>,
}

impl CommandProvider {
    /// Creates a new command provider.
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command_name: command.into(),
            args: Vec::new(),
            payload_field: Some("measurement_counts".to_string()),
        }
    }

    /// Creates a provider from its TOML configuration.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            command_name: config.command.clone(),
            args: config.args.clone(),
            payload_field: config.payload_field().map(str::to_string),
        }
    }

    /// Sets the arguments placed before the payload.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the payload field; `None` compares whole bodies.
    #[must_use]
    pub fn with_payload_field(mut self, field: Option<&str>) -> Self {
        self.payload_field = field.map(str::to_string);
        self
    }

    /// The executable.
    pub fn command(&self) -> &str {
        &self.command_name
    }
}

#[async_trait]
impl ProviderAdapter for CommandProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "command"
    }

    fn endpoint(&self) -> String {
        if self.args.is_empty() {
            self.command_name.clone()
        } else {
            format!("{} {}", self.command_name, self.args.join(" "))
        }
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.command_name)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn invoke(&self, task: &Task, deadline: Instant) -> Outcome {
        let started = Instant::now();
        let wire = task.to_wire().to_string();

        let mut command = Command::new(&self.command_name);
        command.args(&self.args).arg(&wire).kill_on_drop(true);

        match tokio::time::timeout_at(deadline, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                decode_outcome(&stdout, self.payload_field.as_deref(), started.elapsed())
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Outcome::failure(
                    ErrorKind::RemoteRejection,
                    format!(
                        "{} exited with {}: {}",
                        self.command_name,
                        output.status,
                        truncate(&stderr, 500)
                    ),
                )
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Outcome::failure(
                ErrorKind::TransportFailure,
                format!("command '{}' not found", self.command_name),
            ),
            Ok(Err(e)) => Outcome::failure(
                ErrorKind::TransportFailure,
                format!("failed to run '{}': {}", self.command_name, e),
            ),
            // The child is killed when the output future is dropped.
            Err(_) => Outcome::timeout(format!(
                "'{}' did not answer before the deadline",
                self.command_name
            )),
        }
    }
}
