//! Built-in hooks.
//!
//! - `LoggingHook`: logs a summary of every round
//! - `MetricsHook`: counts rounds, agreements, dissents and failures

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::types::responses::ErrorKind;
use crate::XfaasResult;

use super::{Hook, HookContext, HookEvent, HookResult};

// ═══════════════════════════════════════════════════════════════════════════
// LoggingHook
// ═══════════════════════════════════════════════════════════════════════════

/// Logs the outcome of each dispatch round (post_dispatch).
#[derive(Debug, Default)]
pub struct LoggingHook;

impl LoggingHook {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn event(&self) -> HookEvent {
        HookEvent::PostDispatch
    }

    async fn execute(&self, context: &HookContext<'_>) -> XfaasResult<HookResult> {
        if let HookContext::PostDispatch { task, report } = context {
            tracing::info!(
                task_id = %report.task_id,
                kind = %task.kind,
                agreed = report.verdict.agreed,
                agreement_ratio = report.verdict.agreement_ratio,
                success_count = report.success_count,
                total_count = report.total_count,
                "Round finished"
            );

            if report.success_count == 0 {
                tracing::warn!(
                    task_id = %report.task_id,
                    "No provider returned a result"
                );
            } else if !report.verdict.dissenting_providers.is_empty() {
                tracing::warn!(
                    task_id = %report.task_id,
                    dissenting = ?report.verdict.dissenting_providers,
                    "Providers returned different results"
                );
            }
        }

        Ok(HookResult::Continue)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MetricsHook
// ═══════════════════════════════════════════════════════════════════════════

/// Collects dispatch metrics across rounds.
#[derive(Debug, Default)]
pub struct MetricsHook {
    rounds: AtomicU64,
    agreements: AtomicU64,
    dissents: AtomicU64,
    provider_failures: AtomicU64,
    timeouts: AtomicU64,

    /// Sum of agreement ratios in thousandths.
    ratio_sum: AtomicU64,
}

impl MetricsHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    pub fn total_agreements(&self) -> u64 {
        self.agreements.load(Ordering::Relaxed)
    }

    pub fn total_dissents(&self) -> u64 {
        self.dissents.load(Ordering::Relaxed)
    }

    /// Failed provider outcomes, timeouts included.
    pub fn total_provider_failures(&self) -> u64 {
        self.provider_failures.load(Ordering::Relaxed)
    }

    pub fn total_timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Mean agreement ratio over all rounds.
    pub fn mean_agreement_ratio(&self) -> f64 {
        let rounds = self.total_rounds();
        if rounds == 0 {
            0.0
        } else {
            self.ratio_sum.load(Ordering::Relaxed) as f64 / 1000.0 / rounds as f64
        }
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            rounds: self.total_rounds(),
            agreements: self.total_agreements(),
            dissents: self.total_dissents(),
            provider_failures: self.total_provider_failures(),
            timeouts: self.total_timeouts(),
            mean_agreement_ratio: self.mean_agreement_ratio(),
        }
    }
}

/// Metrics collected by [`MetricsHook`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub rounds: u64,
    pub agreements: u64,
    pub dissents: u64,
    pub provider_failures: u64,
    pub timeouts: u64,
    pub mean_agreement_ratio: f64,
}

#[async_trait]
impl Hook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn event(&self) -> HookEvent {
        HookEvent::PostDispatch
    }

    async fn execute(&self, context: &HookContext<'_>) -> XfaasResult<HookResult> {
        if let HookContext::PostDispatch { report, .. } = context {
            self.rounds.fetch_add(1, Ordering::Relaxed);

            if report.verdict.agreed {
                self.agreements.fetch_add(1, Ordering::Relaxed);
            } else if report.verdict.groups.len() > 1 {
                self.dissents.fetch_add(1, Ordering::Relaxed);
            }

            let failures = (report.total_count - report.success_count) as u64;
            self.provider_failures.fetch_add(failures, Ordering::Relaxed);
            self.timeouts.fetch_add(
                report.count_failures(ErrorKind::Timeout) as u64,
                Ordering::Relaxed,
            );

            let ratio = (report.verdict.agreement_ratio * 1000.0).round() as u64;
            self.ratio_sum.fetch_add(ratio, Ordering::Relaxed);
        }

        Ok(HookResult::Continue)
    }
}
