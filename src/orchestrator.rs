//! Glue between configuration, providers, dispatcher, hooks and storage.

use std::sync::Arc;

use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::hooks::{Hook, HookSystem, Metrics, MetricsHook};
use crate::providers::{ProviderAdapter, ProviderRegistry};
use crate::storage::ResultStore;
use crate::types::config::Config;
use crate::types::requests::Task;
use crate::types::responses::DispatchReport;
use crate::XfaasResult;

/// Runs dispatch rounds for one configuration.
pub struct Orchestrator {
    config: Config,
    registry: ProviderRegistry,
    dispatcher: Dispatcher,
    hooks: HookSystem,
    metrics: Option<Arc<MetricsHook>>,
    store: Option<ResultStore>,
}

impl Orchestrator {
    /// Creates an orchestrator with the providers enabled in `config`.
    pub fn new(config: Config) -> XfaasResult<Self> {
        let registry = ProviderRegistry::from_config(&config)?;
        Self::with_registry(config, registry)
    }

    /// Creates an orchestrator over an explicit registry.
    pub fn with_registry(config: Config, registry: ProviderRegistry) -> XfaasResult<Self> {
        let dispatch_config = DispatchConfig::from_settings(&config.dispatch);
        dispatch_config.validate()?;

        let mut hooks = if config.hooks.logging {
            HookSystem::with_defaults()
        } else {
            HookSystem::new()
        };

        let metrics = if config.hooks.metrics {
            let metrics = Arc::new(MetricsHook::new());
            hooks.register(Box::new(Arc::clone(&metrics)));
            Some(metrics)
        } else {
            None
        };

        let store = config
            .general
            .save_results
            .then(|| ResultStore::new(config.general.results_dir.clone()));

        Ok(Self {
            config,
            registry,
            dispatcher: Dispatcher::new(dispatch_config),
            hooks,
            metrics,
            store,
        })
    }

    /// Registers an additional hook.
    pub fn register_hook(&mut self, hook: Box<dyn Hook>) {
        self.hooks.register(hook);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Where reports are persisted, if anywhere.
    pub fn store(&self) -> Option<&ResultStore> {
        self.store.as_ref()
    }

    /// Metrics snapshot, when the metrics hook is enabled.
    pub fn metrics(&self) -> Option<Metrics> {
        self.metrics.as_ref().map(|m| m.metrics())
    }

    /// Runs one round over every registered provider.
    pub async fn run(&self, task: Task) -> XfaasResult<DispatchReport> {
        let providers = self.registry.all().to_vec();
        self.run_with(task, providers).await
    }

    /// Runs one round over the named providers, in the order given.
    pub async fn run_on<S: AsRef<str>>(&self, task: Task, ids: &[S]) -> XfaasResult<DispatchReport> {
        let providers = self.registry.select(ids)?;
        self.run_with(task, providers).await
    }

    async fn run_with(
        &self,
        task: Task,
        providers: Vec<Arc<dyn ProviderAdapter>>,
    ) -> XfaasResult<DispatchReport> {
        let task = self.hooks.run_pre_dispatch(task).await?;

        let report = self.dispatcher.dispatch(&task, &providers).await?;

        self.hooks.run_report_hooks(&task, &report).await;

        if let Some(store) = &self.store {
            // Storage failures do not fail the round.
            if let Err(e) = store.save(&report) {
                tracing::error!(
                    task_id = %report.task_id,
                    error = %e,
                    "Failed to save report"
                );
            }
        }

        Ok(report)
    }
}
