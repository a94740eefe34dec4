//! Outcome, verdict and report types produced by a dispatch round.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a provider call failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The call did not finish before its deadline.
    Timeout,
    /// The backend could not be reached (spawn failure, connection refused, ...).
    TransportFailure,
    /// The backend answered but refused or failed the task.
    RemoteRejection,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "TIMEOUT"),
            ErrorKind::TransportFailure => write!(f, "TRANSPORT_FAILURE"),
            ErrorKind::RemoteRejection => write!(f, "REMOTE_REJECTION"),
        }
    }
}

/// Result of one provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The backend returned a payload.
    Success {
        /// Opaque, comparable result.
        payload: Value,
        /// Wall time of the call in milliseconds.
        #[serde(rename = "latencyMs")]
        latency_ms: u64,
    },
    /// The call failed.
    Failure {
        #[serde(rename = "errorKind")]
        error_kind: ErrorKind,
        message: String,
    },
}

impl Outcome {
    /// Creates a success outcome.
    pub fn success(payload: Value, latency: std::time::Duration) -> Self {
        Self::Success {
            payload,
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a failure outcome.
    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            error_kind,
            message: message.into(),
        }
    }

    /// Creates a timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::failure(ErrorKind::Timeout, message)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Payload of a success.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// Error kind of a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

/// Outcome tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    /// Provider id.
    pub provider: String,

    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ProviderOutcome {
    pub fn new(provider: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            provider: provider.into(),
            outcome,
        }
    }
}

/// One equality class of successful payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementGroup {
    /// SHA-256 of the canonical payload encoding.
    pub fingerprint: String,

    /// Members, in provider order.
    pub providers: Vec<String>,
}

/// Whether the successful outcomes of a round agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusVerdict {
    /// True iff at least one success exists and all successes are equal.
    pub agreed: bool,

    /// |largest class| / |successes|, or 0 without successes.
    pub agreement_ratio: f64,

    /// Payload of the largest class.
    pub reference_payload: Option<Value>,

    /// Successful providers outside the largest class, in provider order.
    pub dissenting_providers: Vec<String>,

    /// Every equality class, in order of first appearance.
    #[serde(default)]
    pub groups: Vec<AgreementGroup>,
}

impl ConsensusVerdict {
    /// Verdict of a round without successes.
    pub fn indeterminate() -> Self {
        Self {
            agreed: false,
            agreement_ratio: 0.0,
            reference_payload: None,
            dissenting_providers: Vec::new(),
            groups: Vec::new(),
        }
    }
}

/// Terminal artifact of one dispatch round.
///
/// Self-describing: consumers never need the original provider list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub task_id: String,

    pub task_kind: String,

    pub shots: u32,

    /// One entry per provider, in dispatch order.
    pub outcomes: Vec<ProviderOutcome>,

    pub verdict: ConsensusVerdict,

    pub success_count: usize,

    pub total_count: usize,

    /// Wall time of the whole round.
    #[serde(default)]
    pub elapsed_ms: u64,

    /// Whether the overall timeout cut the round short.
    #[serde(default)]
    pub deadline_exceeded: bool,

    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl DispatchReport {
    /// Outcome recorded for a provider.
    pub fn outcome(&self, provider: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.provider == provider)
            .map(|o| &o.outcome)
    }

    /// Provider ids in dispatch order.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.provider.as_str()).collect()
    }

    /// Number of failures of the given kind.
    pub fn count_failures(&self, kind: ErrorKind) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.error_kind() == Some(kind))
            .count()
    }

    /// Sets the round duration.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Marks the round as cut by the overall timeout.
    #[must_use]
    pub fn with_deadline_exceeded(mut self, exceeded: bool) -> Self {
        self.deadline_exceeded = exceeded;
        self
    }
}
