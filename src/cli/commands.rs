//! Implementation of the xfaas CLI commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::consensus::ResultAggregator;
use crate::orchestrator::Orchestrator;
use crate::providers::build_provider;
use crate::storage::ResultStore;
use crate::types::config::Config;
use crate::types::requests::{parse_param, Task};
use crate::XfaasResult;

/// Name of the configuration file written by `init`.
pub const CONFIG_FILE: &str = "xfaas.toml";

/// Initializes configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> XfaasResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Edit it directly to change providers or timeouts.");
        return Ok(());
    }

    let config = Config::default_config();
    config.save(&config_path)?;

    update_gitignore(&target_dir, &config.general.results_dir)?;

    println!("xfaas initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Reports directory: {}/", config.general.results_dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Check that providers are reachable: xfaas status");
    println!("  2. Run a first round: xfaas dispatch");

    Ok(())
}

/// Adds the results directory to .gitignore.
fn update_gitignore(target_dir: &Path, results_dir: &Path) -> XfaasResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let entry = format!("{}/", results_dir.display());
    let comment = "# xfaas - stored dispatch reports";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)?;

        if content
            .lines()
            .any(|line| line.trim().trim_end_matches('/') == entry.trim_end_matches('/'))
        {
            tracing::debug!(".gitignore already lists {}", entry);
            return Ok(());
        }

        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(comment);
        new_content.push('\n');
        new_content.push_str(&entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)?;
        println!(".gitignore updated with {}", entry);
    } else {
        std::fs::write(&gitignore_path, format!("{}\n{}\n", comment, entry))?;
        println!(".gitignore created with {}", entry);
    }

    Ok(())
}

/// Options of the `dispatch` command.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub kind: Option<String>,
    pub shots: Option<u32>,
    pub params: Vec<String>,
    pub providers: Vec<String>,
    pub json: bool,
    pub no_save: bool,
}

/// Builds the task described by the options and the `[task]` defaults.
pub fn build_task(options: &DispatchOptions, config: &Config) -> XfaasResult<Task> {
    let kind = options
        .kind
        .clone()
        .unwrap_or_else(|| config.task.kind.clone());
    let shots = options.shots.unwrap_or(config.task.shots);

    let mut task = Task::new(kind, shots);
    for raw in &options.params {
        let (key, value) = parse_param(raw)?;
        task = task.with_param(key, value);
    }

    task.validate()?;
    Ok(task)
}

/// Runs one dispatch round and prints the report.
pub async fn dispatch(options: DispatchOptions, config: &Config) -> XfaasResult<()> {
    let mut config = config.clone();
    if options.no_save {
        config.general.save_results = false;
    }

    let task = build_task(&options, &config)?;
    let orchestrator = Orchestrator::new(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(format!("{} ({} shots)", task.kind, task.shots));
    spinner.set_message(if options.providers.is_empty() {
        format!("dispatching to {} providers...", orchestrator.registry().len())
    } else {
        format!("dispatching to {}...", options.providers.join(", "))
    });
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = if options.providers.is_empty() {
        orchestrator.run(task).await
    } else {
        orchestrator.run_on(task, &options.providers).await
    };
    spinner.finish_and_clear();
    let report = result?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", ResultAggregator::render_summary(&report));
        if let Some(store) = orchestrator.store() {
            println!("Report stored under: {}", store.experiments_dir().display());
        }
    }

    Ok(())
}

/// Shows provider status.
pub async fn status(config: &Config) -> XfaasResult<()> {
    println!("Checking providers...\n");

    for provider_config in &config.providers {
        if !provider_config.enabled {
            println!("  ○ {} - disabled", provider_config.id);
            continue;
        }

        let provider = match build_provider(provider_config) {
            Ok(provider) => provider,
            Err(e) => {
                println!("  ✗ {} - invalid configuration: {}", provider_config.id, e);
                continue;
            }
        };

        let available = provider.is_available().await;
        let status_icon = if available { "✓" } else { "✗" };
        let status_text = if available { "reachable" } else { "unreachable" };

        println!(
            "  {} {} ({}) - {}",
            status_icon,
            provider.id(),
            provider.kind(),
            status_text
        );
        println!("      endpoint: {}", provider.endpoint());
    }

    println!();
    println!(
        "Timeouts: {}s per call, {}s per round",
        config.dispatch.per_call_timeout_secs, config.dispatch.overall_timeout_secs
    );

    Ok(())
}

/// Diagnoses configuration problems.
pub async fn doctor(config: &Config) -> XfaasResult<()> {
    println!("Diagnosing xfaas configuration...\n");

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    println!("✓ Configuration loaded");

    match config.validate() {
        Ok(()) => println!("✓ Configuration is valid"),
        Err(e) => issues.push(e.to_string()),
    }

    if config.dispatch.per_call_timeout_secs > config.dispatch.overall_timeout_secs {
        warnings.push(format!(
            "per-call timeout ({}s) exceeds the overall timeout ({}s); calls are cut at {}s",
            config.dispatch.per_call_timeout_secs,
            config.dispatch.overall_timeout_secs,
            config.dispatch.overall_timeout_secs
        ));
    }

    let mut available_count = 0;
    let mut enabled_count = 0;

    for provider_config in config.enabled_providers() {
        enabled_count += 1;

        let provider = match build_provider(provider_config) {
            Ok(provider) => provider,
            Err(e) => {
                issues.push(format!("{} cannot be built: {}", provider_config.id, e));
                continue;
            }
        };

        if provider.is_available().await {
            available_count += 1;
            println!(
                "✓ {} is reachable ({})",
                provider.id(),
                provider.endpoint()
            );
        } else {
            warnings.push(format!(
                "{} is not reachable ({})",
                provider.id(),
                provider.endpoint()
            ));
        }
    }

    if enabled_count == 0 {
        issues.push("No provider enabled - nothing to dispatch to".to_string());
    } else if available_count == 0 {
        issues.push("No provider reachable - every round would fail".to_string());
    } else if enabled_count == 1 {
        warnings.push("Only one provider enabled - agreement is trivial".to_string());
    } else if available_count < enabled_count {
        warnings.push(format!(
            "Only {}/{} enabled providers are reachable",
            available_count, enabled_count
        ));
    }

    println!();
    if issues.is_empty() && warnings.is_empty() {
        println!("✓ All good! xfaas is ready to dispatch.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for warning in warnings {
                println!("  ⚠ {}", warning);
            }
        }
        if !issues.is_empty() {
            println!("Problems:");
            for issue in issues {
                println!("  ✗ {}", issue);
            }
        }
    }

    Ok(())
}

/// Shows stored reports, newest first.
pub async fn history(limit: usize, config: &Config) -> XfaasResult<()> {
    let store = ResultStore::new(config.general.results_dir.clone());
    let reports = store.list(Some(limit))?;

    if reports.is_empty() {
        println!("No stored reports in {}", store.experiments_dir().display());
        println!("Run 'xfaas dispatch' to create one.");
        return Ok(());
    }

    let summary = store.summary()?;
    println!("Stored reports: {}", summary.total);
    for (kind, count) in &summary.by_kind {
        println!("  {}: {}", kind, count);
    }
    println!();

    for stored in reports {
        let report = &stored.report;
        let icon = if report.verdict.agreed {
            "✓"
        } else if report.success_count == 0 {
            "✗"
        } else {
            "⚠"
        };
        println!(
            "  {} {} {} - {}/{} succeeded, {:.0}% agreement",
            icon,
            stored.metadata.saved_at.format("%Y-%m-%d %H:%M:%S"),
            report.task_kind,
            report.success_count,
            report.total_count,
            report.verdict.agreement_ratio * 100.0
        );
        println!("      {}", stored.metadata.filename);
    }

    Ok(())
}

/// Shows version.
pub fn version() {
    println!("xfaas {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Cross-provider dispatch and consensus for serverless workloads");
}
