//! Dispatch lifecycle hooks.
//!
//! Hooks customise what happens around a dispatch round:
//!
//! - `pre_dispatch`: before the task is fanned out (may replace the task)
//! - `post_dispatch`: after the report is assembled
//! - `on_agreement`: when every successful provider agreed
//! - `on_dissent`: when successful providers disagreed
//!
//! Only `pre_dispatch` can fail a round. Report-phase hooks observe a round
//! that already happened; their errors are logged and never lose the report.

mod builtin;

pub use builtin::{LoggingHook, Metrics, MetricsHook};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::requests::Task;
use crate::types::responses::DispatchReport;
use crate::XfaasResult;

// ═══════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════

/// Event that triggers a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before dispatching.
    PreDispatch,

    /// After the report is assembled.
    PostDispatch,

    /// Successful providers agreed.
    OnAgreement,

    /// Successful providers disagreed.
    OnDissent,
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEvent::PreDispatch => write!(f, "pre_dispatch"),
            HookEvent::PostDispatch => write!(f, "post_dispatch"),
            HookEvent::OnAgreement => write!(f, "on_agreement"),
            HookEvent::OnDissent => write!(f, "on_dissent"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Context
// ═══════════════════════════════════════════════════════════════════════════

/// Context passed to hooks.
pub enum HookContext<'a> {
    /// Context for pre_dispatch.
    PreDispatch {
        /// Task about to be dispatched.
        task: &'a Task,
    },

    /// Context for post_dispatch.
    PostDispatch {
        /// Dispatched task.
        task: &'a Task,
        /// Report of the round.
        report: &'a DispatchReport,
    },

    /// Context for on_agreement.
    OnAgreement {
        /// Report with `verdict.agreed == true`.
        report: &'a DispatchReport,
    },

    /// Context for on_dissent.
    OnDissent {
        /// Report with at least two payload classes.
        report: &'a DispatchReport,
    },
}

impl<'a> HookContext<'a> {
    /// Event matching the context.
    pub fn event(&self) -> HookEvent {
        match self {
            HookContext::PreDispatch { .. } => HookEvent::PreDispatch,
            HookContext::PostDispatch { .. } => HookEvent::PostDispatch,
            HookContext::OnAgreement { .. } => HookEvent::OnAgreement,
            HookContext::OnDissent { .. } => HookEvent::OnDissent,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Result
// ═══════════════════════════════════════════════════════════════════════════

/// Result of running a hook.
#[derive(Debug, Clone, Default)]
pub enum HookResult {
    /// Carry on.
    #[default]
    Continue,

    /// Dispatch this task instead (pre_dispatch only).
    ReplaceTask(Task),
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook trait
// ═══════════════════════════════════════════════════════════════════════════

/// Customisable hook.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Hook name.
    fn name(&self) -> &str;

    /// Event that triggers this hook.
    fn event(&self) -> HookEvent;

    /// Runs the hook.
    async fn execute(&self, context: &HookContext<'_>) -> XfaasResult<HookResult>;
}

/// Lets callers keep a handle on a registered hook (e.g. to read metrics).
#[async_trait]
impl<T: Hook + ?Sized> Hook for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn event(&self) -> HookEvent {
        (**self).event()
    }

    async fn execute(&self, context: &HookContext<'_>) -> XfaasResult<HookResult> {
        (**self).execute(context).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook system
// ═══════════════════════════════════════════════════════════════════════════

/// Hook manager: one ordered hook list per event.
#[derive(Default)]
pub struct HookSystem {
    table: HashMap<HookEvent, Vec<Box<dyn Hook>>>,
}

impl HookSystem {
    /// Creates an empty hook system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a system with the default hooks (logging).
    pub fn with_defaults() -> Self {
        let mut system = Self::new();
        system.register(Box::new(LoggingHook::new()));
        system
    }

    /// Registers a hook under the event it declares.
    pub fn register(&mut self, hook: Box<dyn Hook>) {
        let event = hook.event();
        tracing::debug!(
            hook_name = hook.name(),
            event = %event,
            "Registering hook"
        );

        self.table.entry(event).or_default().push(hook);
    }

    fn hooks_for(&self, event: HookEvent) -> &[Box<dyn Hook>] {
        self.table.get(&event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Runs pre_dispatch hooks.
    ///
    /// Hooks run in registration order; a replaced task is what later hooks
    /// see and what gets dispatched. The first error aborts the round.
    pub async fn run_pre_dispatch(&self, task: Task) -> XfaasResult<Task> {
        let mut current = task;

        for hook in self.hooks_for(HookEvent::PreDispatch) {
            let result = hook
                .execute(&HookContext::PreDispatch { task: &current })
                .await?;
            if let HookResult::ReplaceTask(replacement) = result {
                tracing::info!(hook_name = hook.name(), "Task replaced by pre_dispatch hook");
                current = replacement;
            }
        }

        Ok(current)
    }

    /// Runs the report-phase hooks for a finished round.
    ///
    /// post_dispatch hooks always run, then on_agreement when the providers
    /// agreed, or on_dissent when two or more payload classes were seen.
    /// A failing hook is logged and the remaining hooks still run.
    pub async fn run_report_hooks(&self, task: &Task, report: &DispatchReport) {
        self.fire(&HookContext::PostDispatch { task, report }).await;

        if report.verdict.agreed {
            self.fire(&HookContext::OnAgreement { report }).await;
        } else if report.verdict.groups.len() > 1 {
            self.fire(&HookContext::OnDissent { report }).await;
        }
    }

    async fn fire(&self, context: &HookContext<'_>) {
        let event = context.event();

        for hook in self.hooks_for(event) {
            if let Err(e) = hook.execute(context).await {
                tracing::error!(
                    hook_name = hook.name(),
                    event = %event,
                    error = %e,
                    "Hook failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{ConsensusEvaluator, ResultAggregator};
    use crate::types::responses::{ErrorKind, Outcome, ProviderOutcome};
    use crate::XfaasError;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    // Appends "<name>:<event>" to a shared log.
    struct RecordingHook {
        name: String,
        event: HookEvent,
        log: Log,
    }

    impl RecordingHook {
        fn boxed(name: &str, event: HookEvent, log: &Log) -> Box<dyn Hook> {
            Box::new(Self {
                name: name.to_string(),
                event,
                log: Arc::clone(log),
            })
        }
    }

    #[async_trait]
    impl Hook for RecordingHook {
        fn name(&self) -> &str {
            &self.name
        }

        fn event(&self) -> HookEvent {
            self.event
        }

        async fn execute(&self, context: &HookContext<'_>) -> XfaasResult<HookResult> {
            let entry = match context {
                HookContext::PreDispatch { task } => format!("{}:shots={}", self.name, task.shots),
                other => format!("{}:{}", self.name, other.event()),
            };
            self.log.lock().unwrap().push(entry);
            Ok(HookResult::Continue)
        }
    }

    struct FailingHook(HookEvent);

    #[async_trait]
    impl Hook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        fn event(&self) -> HookEvent {
            self.0
        }

        async fn execute(&self, _context: &HookContext<'_>) -> XfaasResult<HookResult> {
            Err(XfaasError::config("hook refused"))
        }
    }

    struct ShotsOverride(u32);

    #[async_trait]
    impl Hook for ShotsOverride {
        fn name(&self) -> &str {
            "shots_override"
        }

        fn event(&self) -> HookEvent {
            HookEvent::PreDispatch
        }

        async fn execute(&self, context: &HookContext<'_>) -> XfaasResult<HookResult> {
            match context {
                HookContext::PreDispatch { task } => {
                    let mut task = (*task).clone();
                    task.shots = self.0;
                    Ok(HookResult::ReplaceTask(task))
                }
                _ => Ok(HookResult::Continue),
            }
        }
    }

    fn report_with(outcomes: Vec<ProviderOutcome>) -> DispatchReport {
        let verdict = ConsensusEvaluator::evaluate(&outcomes);
        ResultAggregator::aggregate(&Task::new("bell_state", 512), outcomes, verdict)
    }

    fn success(provider: &str, payload: Value) -> ProviderOutcome {
        ProviderOutcome::new(provider, Outcome::success(payload, Duration::ZERO))
    }

    fn agreeing_report() -> DispatchReport {
        report_with(vec![
            success("aws", json!({"00": 512})),
            success("gcp", json!({"00": 512})),
        ])
    }

    fn dissenting_report() -> DispatchReport {
        report_with(vec![
            success("aws", json!({"00": 512})),
            success("gcp", json!({"00": 511})),
        ])
    }

    fn all_lifecycle_hooks(log: &Log) -> HookSystem {
        let mut system = HookSystem::new();
        system.register(RecordingHook::boxed("post", HookEvent::PostDispatch, log));
        system.register(RecordingHook::boxed("agree", HookEvent::OnAgreement, log));
        system.register(RecordingHook::boxed("dissent", HookEvent::OnDissent, log));
        system
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_empty_system_passes_task_through() {
        let system = HookSystem::new();
        let task = Task::new("bell_state", 1024);

        let dispatched = system.run_pre_dispatch(task.clone()).await.unwrap();
        assert_eq!(dispatched, task);

        system.run_report_hooks(&task, &agreeing_report()).await;
    }

    #[tokio::test]
    async fn test_pre_dispatch_replaces_task() {
        let log = Log::default();
        let mut system = HookSystem::new();
        system.register(RecordingHook::boxed("before", HookEvent::PreDispatch, &log));
        system.register(Box::new(ShotsOverride(64)));
        system.register(RecordingHook::boxed("after", HookEvent::PreDispatch, &log));

        let task = system
            .run_pre_dispatch(Task::new("bell_state", 1024))
            .await
            .unwrap();

        assert_eq!(task.shots, 64);
        assert_eq!(entries(&log), vec!["before:shots=1024", "after:shots=64"]);
    }

    #[tokio::test]
    async fn test_pre_dispatch_error_aborts() {
        let log = Log::default();
        let mut system = HookSystem::new();
        system.register(Box::new(FailingHook(HookEvent::PreDispatch)));
        system.register(RecordingHook::boxed("after", HookEvent::PreDispatch, &log));

        let err = system
            .run_pre_dispatch(Task::new("bell_state", 1024))
            .await
            .unwrap_err();

        assert!(err.is_config());
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_agreement_fires_post_then_agreement() {
        let log = Log::default();
        let system = all_lifecycle_hooks(&log);

        let task = Task::new("bell_state", 512);
        system.run_report_hooks(&task, &agreeing_report()).await;

        assert_eq!(entries(&log), vec!["post:post_dispatch", "agree:on_agreement"]);
    }

    #[tokio::test]
    async fn test_dissent_fires_post_then_dissent() {
        let log = Log::default();
        let system = all_lifecycle_hooks(&log);

        let task = Task::new("bell_state", 512);
        system.run_report_hooks(&task, &dissenting_report()).await;

        assert_eq!(entries(&log), vec!["post:post_dispatch", "dissent:on_dissent"]);
    }

    #[tokio::test]
    async fn test_no_successes_fires_post_only() {
        let log = Log::default();
        let system = all_lifecycle_hooks(&log);

        let report = report_with(vec![ProviderOutcome::new(
            "aws",
            Outcome::failure(ErrorKind::Timeout, "slow"),
        )]);
        system.run_report_hooks(&Task::new("bell_state", 512), &report).await;

        assert_eq!(entries(&log), vec!["post:post_dispatch"]);
    }

    #[tokio::test]
    async fn test_failing_report_hook_does_not_stop_the_rest() {
        let log = Log::default();
        let mut system = HookSystem::new();
        system.register(Box::new(FailingHook(HookEvent::PostDispatch)));
        system.register(RecordingHook::boxed("post", HookEvent::PostDispatch, &log));
        system.register(Box::new(FailingHook(HookEvent::OnDissent)));
        system.register(RecordingHook::boxed("dissent", HookEvent::OnDissent, &log));

        let task = Task::new("bell_state", 512);
        system.run_report_hooks(&task, &dissenting_report()).await;

        assert_eq!(entries(&log), vec!["post:post_dispatch", "dissent:on_dissent"]);
    }

    #[test]
    fn test_hook_event_display() {
        assert_eq!(format!("{}", HookEvent::PreDispatch), "pre_dispatch");
        assert_eq!(format!("{}", HookEvent::PostDispatch), "post_dispatch");
        assert_eq!(format!("{}", HookEvent::OnAgreement), "on_agreement");
        assert_eq!(format!("{}", HookEvent::OnDissent), "on_dissent");
    }

    #[tokio::test]
    async fn test_arc_hook_shares_state() {
        let mut system = HookSystem::new();
        let metrics = Arc::new(MetricsHook::new());
        system.register(Box::new(Arc::clone(&metrics)));

        let task = Task::new("bell_state", 512);
        system.run_report_hooks(&task, &agreeing_report()).await;
        system.run_report_hooks(&task, &dissenting_report()).await;

        assert_eq!(metrics.total_rounds(), 2);
        assert_eq!(metrics.total_dissents(), 1);
    }
}
