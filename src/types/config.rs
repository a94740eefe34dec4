//! Configuration for xfaas.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{XfaasError, XfaasResult};

/// Main configuration for xfaas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dispatch timeouts.
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Task defaults used by the CLI.
    #[serde(default)]
    pub task: TaskDefaults,

    /// Lifecycle hooks.
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Provider registry, in dispatch order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Directory where dispatch reports are stored.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Persist every report to `results_dir`.
    #[serde(default = "default_true")]
    pub save_results: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            results_dir: default_results_dir(),
            save_results: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_true() -> bool {
    true
}

/// Timeouts applied to every dispatch round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Bound on a single provider call (in seconds).
    #[serde(default = "default_per_call_timeout")]
    pub per_call_timeout_secs: u64,

    /// Bound on the whole round (in seconds).
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: u64,
}

impl DispatchSettings {
    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            per_call_timeout_secs: default_per_call_timeout(),
            overall_timeout_secs: default_overall_timeout(),
        }
    }
}

fn default_per_call_timeout() -> u64 {
    300
}

fn default_overall_timeout() -> u64 {
    600
}

/// Task defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefaults {
    /// Default operation tag.
    #[serde(default = "default_task_kind")]
    pub kind: String,

    /// Default shot count.
    #[serde(default = "default_shots")]
    pub shots: u32,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            kind: default_task_kind(),
            shots: default_shots(),
        }
    }
}

fn default_task_kind() -> String {
    "bell_state".to_string()
}

fn default_shots() -> u32 {
    1024
}

/// Built-in hook toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Log a summary of every round.
    #[serde(default = "default_true")]
    pub logging: bool,

    /// Collect round metrics.
    #[serde(default)]
    pub metrics: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            logging: true,
            metrics: false,
        }
    }
}

/// How a provider is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// A local CLI that invokes the remote function.
    Command,
    /// An HTTP-triggered function.
    Http,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Command => write!(f, "command"),
            ProviderKind::Http => write!(f, "http"),
        }
    }
}

/// Configuration for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider id.
    pub id: String,

    /// Adapter family.
    pub kind: ProviderKind,

    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Command to execute (`command` providers).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,

    /// Arguments placed before the task payload (`command` providers).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Function URL (`http` providers).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Extra request headers (`http` providers).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Response field holding the comparable payload. Empty means the whole body.
    #[serde(default = "default_payload_field")]
    pub payload_field: String,
}

impl ProviderConfig {
    /// Creates a command provider.
    pub fn command(id: &str, command: &str, args: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            kind: ProviderKind::Command,
            enabled: true,
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            url: String::new(),
            headers: BTreeMap::new(),
            payload_field: default_payload_field(),
        }
    }

    /// Creates an HTTP provider.
    pub fn http(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: ProviderKind::Http,
            enabled: true,
            command: String::new(),
            args: Vec::new(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            payload_field: default_payload_field(),
        }
    }

    /// Payload field, `None` when the whole body is the payload.
    pub fn payload_field(&self) -> Option<&str> {
        let field = self.payload_field.trim();
        (!field.is_empty()).then_some(field)
    }
}

fn default_payload_field() -> String {
    "measurement_counts".to_string()
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        // The payload is appended after `--payload`; the function response is
        // written to stdout ahead of the invocation metadata.
        ProviderConfig::command(
            "aws",
            "aws",
            &[
                "lambda",
                "invoke",
                "--function-name",
                "quantum-processor-aws",
                "--cli-binary-format",
                "raw-in-base64-out",
                "/dev/stdout",
                "--payload",
            ],
        ),
        ProviderConfig::http(
            "azure",
            "https://quantum-processor-azure.azurewebsites.net/api/quantum",
        ),
        ProviderConfig::http(
            "gcp",
            "https://us-central1-xfaas-quantum.cloudfunctions.net/quantum-processor-gcp",
        ),
    ]
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> XfaasResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> XfaasResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            dispatch: DispatchSettings::default(),
            task: TaskDefaults::default(),
            hooks: HooksConfig::default(),
            providers: default_providers(),
        }
    }

    /// Loads `path`, falling back to the default configuration.
    ///
    /// A missing file is the normal first-run case. A file that exists but
    /// cannot be read or parsed is logged at warn level before falling back.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Self::default_config();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable config file, using defaults"
                );
                Self::default_config()
            }
        }
    }

    /// Enabled providers, in dispatch order.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Checks the configuration for values no round could run with.
    pub fn validate(&self) -> XfaasResult<()> {
        if self.dispatch.per_call_timeout_secs == 0 || self.dispatch.overall_timeout_secs == 0 {
            return Err(XfaasError::config("dispatch timeouts must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(XfaasError::config("provider id must not be empty"));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(XfaasError::DuplicateProvider(provider.id.clone()));
            }
            match provider.kind {
                ProviderKind::Command if provider.command.trim().is_empty() => {
                    return Err(XfaasError::config(format!(
                        "provider '{}' has no command",
                        provider.id
                    )));
                }
                ProviderKind::Http if provider.url.trim().is_empty() => {
                    return Err(XfaasError::config(format!(
                        "provider '{}' has no url",
                        provider.id
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
