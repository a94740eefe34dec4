//! Result aggregator.
//!
//! Responsible for:
//! - Assembling the dispatch report from outcomes and verdict
//! - Rendering a human-readable summary of a report

use crate::types::requests::Task;
use crate::types::responses::{ConsensusVerdict, DispatchReport, Outcome, ProviderOutcome};

use super::evaluator::payload_fingerprint;

/// Result aggregator.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Builds the report of a round.
    pub fn aggregate(
        task: &Task,
        outcomes: Vec<ProviderOutcome>,
        verdict: ConsensusVerdict,
    ) -> DispatchReport {
        let success_count = Self::success_count(&outcomes);
        let total_count = outcomes.len();

        DispatchReport {
            task_id: task.id.clone(),
            task_kind: task.kind.clone(),
            shots: task.shots,
            outcomes,
            verdict,
            success_count,
            total_count,
            elapsed_ms: 0,
            deadline_exceeded: false,
            completed_at: chrono::Utc::now(),
        }
    }

    /// Number of successful outcomes.
    pub fn success_count(outcomes: &[ProviderOutcome]) -> usize {
        outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    /// Renders a Markdown summary of a report.
    pub fn render_summary(report: &DispatchReport) -> String {
        let mut summary = String::new();

        let header = if report.success_count == 0 {
            "## No Successful Executions"
        } else if report.verdict.agreed {
            "## Consensus Reached"
        } else {
            "## Providers Disagree"
        };
        summary.push_str(header);
        summary.push_str("\n\n");

        summary.push_str(&format!(
            "**Task:** {} ({} shots) `{}`\n",
            report.task_kind, report.shots, report.task_id
        ));
        summary.push_str(&format!(
            "**Outcomes:** {} succeeded | {} failed (of {})\n",
            report.success_count,
            report.total_count - report.success_count,
            report.total_count
        ));
        summary.push_str(&format!(
            "**Agreement:** {:.1}%\n",
            report.verdict.agreement_ratio * 100.0
        ));
        if report.deadline_exceeded {
            summary.push_str("**Note:** the overall timeout cut this round short\n");
        }
        summary.push('\n');

        summary.push_str("### Providers\n\n");
        for entry in &report.outcomes {
            match &entry.outcome {
                Outcome::Success {
                    payload,
                    latency_ms,
                } => {
                    let dissenting = report.verdict.dissenting_providers.contains(&entry.provider);
                    let icon = if dissenting { "⚠" } else { "✓" };
                    let fingerprint = payload_fingerprint(payload);
                    summary.push_str(&format!(
                        "**{} {}** ({} ms) payload `{}`\n",
                        icon,
                        entry.provider,
                        latency_ms,
                        &fingerprint[..12]
                    ));
                }
                Outcome::Failure {
                    error_kind,
                    message,
                } => {
                    summary.push_str(&format!(
                        "**✗ {}** {}\n> {}\n",
                        entry.provider, error_kind, message
                    ));
                }
            }
        }

        if let Some(reference) = &report.verdict.reference_payload {
            summary.push_str("\n### Reference Payload\n\n");
            summary.push_str(&format!("```json\n{}\n```\n", reference));
        }

        if !report.verdict.dissenting_providers.is_empty() {
            summary.push_str("\n### Dissent\n\n");
            for provider in &report.verdict.dissenting_providers {
                summary.push_str(&format!("- {}\n", provider));
            }
        }

        summary
    }
}
