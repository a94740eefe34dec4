//! Provider backed by an HTTP-triggered function.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::base::{decode_outcome, remaining, truncate, ProviderAdapter};
use crate::types::config::ProviderConfig;
use crate::types::requests::Task;
use crate::types::responses::{ErrorKind, Outcome};
use crate::XfaasResult;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs the task to a function URL (Azure Functions, Cloud Functions, ...).
pub struct HttpProvider {
    id: String,
    url: String,
    headers: BTreeMap<String, String>,
    payload_field: Option<String>,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Creates a new HTTP provider.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> XfaasResult<Self> {
        Ok(Self {
            id: id.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            payload_field: Some("measurement_counts".to_string()),
            client: build_client()?,
        })
    }

    /// Creates a provider from its TOML configuration.
    pub fn from_config(config: &ProviderConfig) -> XfaasResult<Self> {
        Ok(Self {
            id: config.id.clone(),
            url: config.url.clone(),
            headers: config.headers.clone(),
            payload_field: config.payload_field().map(str::to_string),
            client: build_client()?,
        })
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the payload field; `None` compares whole bodies.
    #[must_use]
    pub fn with_payload_field(mut self, field: Option<&str>) -> Self {
        self.payload_field = field.map(str::to_string);
        self
    }

    fn timeout_outcome(&self) -> Outcome {
        Outcome::timeout(format!("{} did not answer before the deadline", self.url))
    }
}

fn build_client() -> XfaasResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("xfaas/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(&self.url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok()
    }

    async fn invoke(&self, task: &Task, deadline: Instant) -> Outcome {
        let started = Instant::now();
        let budget = remaining(deadline);
        if budget.is_zero() {
            return self.timeout_outcome();
        }

        let mut request = self
            .client
            .post(&self.url)
            .timeout(budget)
            .json(&task.to_wire());
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = match tokio::time::timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return self.timeout_outcome(),
            Ok(Err(e)) => {
                return Outcome::failure(
                    ErrorKind::TransportFailure,
                    format!("request to {} failed: {}", self.url, e),
                )
            }
            Err(_) => return self.timeout_outcome(),
        };

        let status = response.status();
        let text = match tokio::time::timeout_at(deadline, response.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) if e.is_timeout() => return self.timeout_outcome(),
            Ok(Err(e)) => {
                return Outcome::failure(
                    ErrorKind::TransportFailure,
                    format!("failed to read response from {}: {}", self.url, e),
                )
            }
            Err(_) => return self.timeout_outcome(),
        };

        if !status.is_success() {
            return Outcome::failure(
                ErrorKind::RemoteRejection,
                format!("HTTP {}: {}", status, truncate(&text, 500)),
            );
        }

        decode_outcome(&text, self.payload_field.as_deref(), started.elapsed())
    }
}
