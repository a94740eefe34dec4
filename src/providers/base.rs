//! Base trait for provider adapters.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::types::requests::Task;
use crate::types::responses::{ErrorKind, Outcome};

/// Capability wrapper around one execution backend.
///
/// Every adapter honours the same contract:
///
/// - `invoke` never runs past `deadline`; when it would, it returns
///   `Failure{Timeout}` instead.
/// - `invoke` never fails: transport problems become `TransportFailure`,
///   refusals and malformed answers become `RemoteRejection`.
///
/// Adapters differ only in how they reach their backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider id.
    fn id(&self) -> &str;

    /// Adapter family (`command`, `http`, ...).
    fn kind(&self) -> &str;

    /// Human-readable address of the backend.
    fn endpoint(&self) -> String;

    /// Cheap reachability probe.
    async fn is_available(&self) -> bool {
        true
    }

    /// Runs the task on the backend.
    async fn invoke(&self, task: &Task, deadline: Instant) -> Outcome;
}

/// Time left until `deadline`, zero once it has passed.
pub fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Decoded response of a backend function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    /// Function body, with any transport envelope removed.
    pub body: Value,
}

impl FunctionResponse {
    /// Parses the first JSON object found in a function's raw output.
    ///
    /// Proxy-style envelopes (`{"statusCode": .., "body": "<json>"}`) are
    /// unwrapped; an envelope status of 400 or above is a rejection.
    pub fn parse_from_output(output: &str) -> Result<Self, String> {
        let start = output
            .find('{')
            .ok_or_else(|| "response does not contain a JSON object".to_string())?;

        let value = serde_json::Deserializer::from_str(&output[start..])
            .into_iter::<Value>()
            .next()
            .ok_or_else(|| "response does not contain a JSON object".to_string())?
            .map_err(|e| format!("failed to parse response JSON: {}", e))?;

        let Some(status) = value.get("statusCode").and_then(Value::as_u64) else {
            return Ok(Self { body: value });
        };

        let body = match value.get("body") {
            Some(Value::String(raw)) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            Some(other) => other.clone(),
            None => Value::Null,
        };

        if status >= 400 {
            return Err(format!(
                "function returned status {}: {}",
                status,
                error_message(&body)
            ));
        }

        Ok(Self { body })
    }

    /// Extracts the comparable payload.
    ///
    /// A body that reports `success: false` is a rejection. With a field
    /// configured the payload is that field, otherwise the whole body.
    pub fn into_payload(self, payload_field: Option<&str>) -> Result<Value, String> {
        if self.body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(format!(
                "function reported failure: {}",
                error_message(&self.body)
            ));
        }

        match payload_field {
            Some(field) => self
                .body
                .get(field)
                .cloned()
                .ok_or_else(|| format!("response is missing field '{}'", field)),
            None => Ok(self.body),
        }
    }
}

/// Turns raw function output into an outcome.
pub fn decode_outcome(output: &str, payload_field: Option<&str>, latency: Duration) -> Outcome {
    match FunctionResponse::parse_from_output(output)
        .and_then(|response| response.into_payload(payload_field))
    {
        Ok(payload) => Outcome::success(payload, latency),
        Err(message) => Outcome::failure(ErrorKind::RemoteRejection, message),
    }
}

fn error_message(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => truncate(&body.to_string(), 200),
    }
}

/// Shortens backend text for inclusion in failure messages.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(max_chars).collect();
    short.push('…');
    short
}
