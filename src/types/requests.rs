//! Task descriptors handed to providers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{XfaasError, XfaasResult};

/// One logical unit of work fanned out to every provider of a round.
///
/// Immutable once built: the dispatcher shares it read-only across all
/// adapter calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: String,

    /// Operation tag (e.g. `bell_state`).
    pub kind: String,

    /// Repetition / shot count.
    pub shots: u32,

    /// Extra domain parameters, passed through untouched.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Task {
    /// Creates a new task with a fresh id.
    pub fn new(kind: impl Into<String>, shots: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            shots,
            params: Map::new(),
        }
    }

    /// Overrides the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds a domain parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Rejects tasks no backend could run: an empty `kind` or zero `shots`.
    ///
    /// Checked by the dispatcher before any provider is invoked, so a bad
    /// task never reaches a backend.
    pub fn validate(&self) -> XfaasResult<()> {
        if self.kind.trim().is_empty() {
            return Err(XfaasError::config("task kind must not be empty"));
        }
        if self.shots == 0 {
            return Err(XfaasError::config("task shots must be greater than zero"));
        }
        Ok(())
    }

    /// JSON body sent to a backend function.
    ///
    /// Domain parameters are merged in first so they can never shadow the
    /// reserved keys.
    pub fn to_wire(&self) -> Value {
        let mut body = self.params.clone();
        body.insert("taskId".to_string(), Value::from(self.id.clone()));
        body.insert("kind".to_string(), Value::from(self.kind.clone()));
        // Function handlers key the circuit by `circuit`.
        body.insert("circuit".to_string(), Value::from(self.kind.clone()));
        body.insert("shots".to_string(), Value::from(self.shots));
        Value::Object(body)
    }
}

/// Parses a `key=value` CLI parameter. Values that parse as JSON keep their
/// type, anything else becomes a string.
pub fn parse_param(raw: &str) -> XfaasResult<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| XfaasError::config(format!("parameter '{}' is not key=value", raw)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(XfaasError::config(format!("parameter '{}' has an empty key", raw)));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}
