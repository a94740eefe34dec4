use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use xfaas::cli::commands::{self, DispatchOptions};
use xfaas::cli::{Cli, Commands};
use xfaas::types::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration is loaded before logging so it can pick the level.
    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        Config::default_config()
    };

    // CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("xfaas={}", log_level)
            .parse()
            .unwrap_or_else(|_| "xfaas=info".parse().expect("fallback directive is valid")),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if config.general.log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            commands::init(path).await?;
        }
        Commands::Dispatch {
            kind,
            shots,
            params,
            providers,
            json,
            no_save,
        } => {
            let options = DispatchOptions {
                kind,
                shots,
                params,
                providers,
                json,
                no_save,
            };
            commands::dispatch(options, &config)
                .await
                .context("dispatch failed")?;
        }
        Commands::Status => {
            commands::status(&config).await?;
        }
        Commands::Doctor => {
            commands::doctor(&config).await?;
        }
        Commands::History { limit } => {
            commands::history(limit, &config).await?;
        }
        Commands::Version => {
            commands::version();
        }
    }

    Ok(())
}
