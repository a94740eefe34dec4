//! Concurrent fan-out of one task to many providers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;

use super::round::Round;
use crate::consensus::{ConsensusEvaluator, ResultAggregator};
use crate::providers::ProviderAdapter;
use crate::types::config::DispatchSettings;
use crate::types::requests::Task;
use crate::types::responses::{DispatchReport, ErrorKind, Outcome};
use crate::{XfaasError, XfaasResult};

/// Timeouts of a dispatch round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Bound on one adapter call.
    pub per_call_timeout: Duration,

    /// Bound on the whole round.
    pub overall_timeout: Duration,
}

impl DispatchConfig {
    pub fn new(per_call_timeout: Duration, overall_timeout: Duration) -> Self {
        Self {
            per_call_timeout,
            overall_timeout,
        }
    }

    /// Reads the `[dispatch]` section of the configuration.
    pub fn from_settings(settings: &DispatchSettings) -> Self {
        Self::new(settings.per_call_timeout(), settings.overall_timeout())
    }

    pub fn validate(&self) -> XfaasResult<()> {
        if self.per_call_timeout.is_zero() || self.overall_timeout.is_zero() {
            return Err(XfaasError::config("dispatch timeouts must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from_settings(&DispatchSettings::default())
    }
}

/// Fans a task out to providers and assembles the report.
///
/// Holds no state across rounds.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    /// Creates a new dispatcher.
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs one dispatch round.
    ///
    /// Every provider is invoked concurrently, each bounded by the per-call
    /// timeout and all of them by the overall timeout. Provider failures are
    /// recorded in the report; only invalid invocations return an error, and
    /// they do so before any provider is invoked.
    ///
    /// # Errors
    ///
    /// [`XfaasError::Config`] for an empty provider list, zero timeouts, an
    /// empty task kind or a task with zero shots.
    /// [`XfaasError::DuplicateProvider`] when two providers share an id.
    pub async fn dispatch(
        &self,
        task: &Task,
        providers: &[Arc<dyn ProviderAdapter>],
    ) -> XfaasResult<DispatchReport> {
        if providers.is_empty() {
            return Err(XfaasError::config("cannot dispatch to zero providers"));
        }
        self.config.validate()?;
        task.validate()?;

        let mut seen = HashSet::new();
        for provider in providers {
            if !seen.insert(provider.id()) {
                return Err(XfaasError::DuplicateProvider(provider.id().to_string()));
            }
        }

        let started = Instant::now();
        let overall_deadline = started + self.config.overall_timeout;
        let shared_task = Arc::new(task.clone());

        tracing::info!(
            task_id = %task.id,
            kind = %task.kind,
            shots = task.shots,
            providers = providers.len(),
            "Dispatching task"
        );

        let mut round = Round::new(providers.iter().map(|p| p.id().to_string()).collect());
        let mut join_set = JoinSet::new();

        for (index, provider) in providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let task = Arc::clone(&shared_task);
            let call_deadline =
                std::cmp::min(Instant::now() + self.config.per_call_timeout, overall_deadline);

            join_set.spawn(async move {
                // Enforced here as well so a misbehaving adapter cannot hold
                // its slot past the deadline.
                let outcome =
                    match tokio::time::timeout_at(call_deadline, provider.invoke(&task, call_deadline))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Outcome::timeout(format!(
                            "provider '{}' did not answer within its call deadline",
                            provider.id()
                        )),
                    };
                (index, outcome)
            });
        }

        let mut deadline_exceeded = false;
        loop {
            match tokio::time::timeout_at(overall_deadline, join_set.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => {
                    log_outcome(providers[index].id(), &outcome);
                    round.record(index, outcome);
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Provider task ended without an outcome");
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_exceeded = true;
                    tracing::warn!(
                        task_id = %task.id,
                        outstanding = ?round.outstanding(),
                        "Overall timeout reached, abandoning outstanding providers"
                    );
                    // Fire-and-forget: adapters stop on their own deadline.
                    join_set.detach_all();
                    break;
                }
            }
        }

        tracing::debug!(
            task_id = %task.id,
            state = %round.state(),
            deadline_exceeded,
            "Collection finished"
        );

        let outcomes = round.finish(|provider| {
            if deadline_exceeded {
                Outcome::timeout(format!(
                    "provider '{}' was still outstanding when the round timed out",
                    provider
                ))
            } else {
                Outcome::failure(
                    ErrorKind::TransportFailure,
                    format!("provider '{}' task ended without an outcome", provider),
                )
            }
        });

        let verdict = ConsensusEvaluator::evaluate(&outcomes);
        let report = ResultAggregator::aggregate(task, outcomes, verdict)
            .with_elapsed(started.elapsed())
            .with_deadline_exceeded(deadline_exceeded);

        tracing::info!(
            task_id = %report.task_id,
            success_count = report.success_count,
            total_count = report.total_count,
            agreed = report.verdict.agreed,
            agreement_ratio = report.verdict.agreement_ratio,
            elapsed_ms = report.elapsed_ms,
            "Dispatch round complete"
        );

        Ok(report)
    }
}

fn log_outcome(provider: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Success { latency_ms, .. } => {
            tracing::debug!(provider, latency_ms = *latency_ms, "Provider succeeded");
        }
        Outcome::Failure {
            error_kind,
            message,
        } => {
            tracing::warn!(provider, error_kind = %error_kind, error = %message, "Provider failed");
        }
    }
}

/// Dispatches `task` to `providers` with explicit timeouts.
pub async fn dispatch(
    task: &Task,
    providers: &[Arc<dyn ProviderAdapter>],
    per_call_timeout: Duration,
    overall_timeout: Duration,
) -> XfaasResult<DispatchReport> {
    Dispatcher::new(DispatchConfig::new(per_call_timeout, overall_timeout))
        .dispatch(task, providers)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FixedProvider {
        id: String,
        payload: Value,
        delay: Duration,
    }

    #[async_trait]
    impl ProviderAdapter for FixedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> &str {
            "fixed"
        }

        fn endpoint(&self) -> String {
            "memory".to_string()
        }

        async fn invoke(&self, _task: &Task, _deadline: Instant) -> Outcome {
            tokio::time::sleep(self.delay).await;
            Outcome::success(self.payload.clone(), self.delay)
        }
    }

    fn fixed(id: &str, payload: Value, delay_ms: u64) -> Arc<dyn ProviderAdapter> {
        Arc::new(FixedProvider {
            id: id.to_string(),
            payload,
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn test_empty_providers_is_config_error() {
        let dispatcher = Dispatcher::default();
        let err = dispatcher
            .dispatch(&Task::new("bell_state", 100), &[])
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_zero_timeout_is_config_error() {
        let providers = vec![fixed("a", json!(1), 0)];
        let err = dispatch(
            &Task::new("bell_state", 100),
            &providers,
            Duration::ZERO,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_duplicate_provider_ids_rejected() {
        let providers = vec![fixed("a", json!(1), 0), fixed("a", json!(1), 0)];
        let err = Dispatcher::default()
            .dispatch(&Task::new("bell_state", 100), &providers)
            .await
            .unwrap_err();
        assert!(matches!(err, XfaasError::DuplicateProvider(_)));
    }

    #[tokio::test]
    async fn test_order_follows_input_not_completion() {
        let providers = vec![
            fixed("slowest", json!(1), 60),
            fixed("fastest", json!(1), 0),
            fixed("middle", json!(1), 30),
        ];
        let report = Dispatcher::default()
            .dispatch(&Task::new("bell_state", 100), &providers)
            .await
            .unwrap();

        assert_eq!(report.provider_ids(), vec!["slowest", "fastest", "middle"]);
        assert!(report.verdict.agreed);
        assert!(!report.deadline_exceeded);
    }

    #[tokio::test]
    async fn test_overall_timeout_records_outstanding_as_timeout() {
        let providers = vec![fixed("quick", json!(1), 0), fixed("stuck", json!(1), 10_000)];
        let started = std::time::Instant::now();

        let report = dispatch(
            &Task::new("bell_state", 100),
            &providers,
            Duration::from_secs(30),
            Duration::from_millis(150),
        )
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.deadline_exceeded);
        assert_eq!(report.success_count, 1);
        assert_eq!(
            report.outcome("stuck").and_then(Outcome::error_kind),
            Some(ErrorKind::Timeout)
        );
    }
}
