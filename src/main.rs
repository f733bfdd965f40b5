// Agent Telemetry - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use agent_telemetry::config::{load_config, Config};
use agent_telemetry::errors::{config_parse_error, export_not_found_error, TelemetryError};
use agent_telemetry::metrics::{generate_report, load_snapshot};
use agent_telemetry::server::TelemetryServer;

#[derive(Parser, Debug)]
#[command(name = "agent-telemetry")]
#[command(about = "Request telemetry and admission control for a shopping agent", version)]
struct Args {
    /// Path to config.toml (default: ~/.agent-telemetry/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP telemetry server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Render a report from an exported metrics.json
    Report {
        /// Export to read (default: metrics.export_path from config)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).map_err(|e| match e {
        TelemetryError::ConfigParse(inner) => {
            let path = args
                .config
                .clone()
                .or_else(agent_telemetry::config::default_config_path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "config.toml".to_string());
            anyhow::anyhow!(config_parse_error(&path, &inner.to_string()))
        }
        other => other.into(),
    })?;

    match args.command {
        Command::Serve { bind } => run_server(config, bind).await,
        Command::Report { input } => run_report(&config, input),
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Initialize tracing: stdout, plus an append-mode log file when configured
fn init_tracing(config: &Config) -> Result<()> {
    // Default: INFO level, can be overridden with RUST_LOG env var
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = match &config.logging.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let log_path = dir.join("agent-telemetry.log");
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;
            let file_writer = Arc::new(log_file);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(move || Arc::clone(&file_writer))
                    .with_ansi(false), // No ANSI colors in log file
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    // Bridge log crate → tracing (for dependencies using log crate)
    tracing_log::LogTracer::init().ok();
    Ok(())
}

/// Run HTTP telemetry server
async fn run_server(mut config: Config, bind: Option<String>) -> Result<()> {
    init_tracing(&config)?;

    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    tracing::info!(
        max_requests = config.rate_limit.max_requests,
        window_seconds = config.rate_limit.window_seconds,
        export_path = %config.metrics.export_path.display(),
        "Telemetry configuration loaded"
    );

    TelemetryServer::from_config(config).serve().await
}

/// Render a report from a previously exported snapshot
fn run_report(config: &Config, input: Option<PathBuf>) -> Result<()> {
    let path = input.unwrap_or_else(|| config.metrics.export_path.clone());
    if !path.exists() {
        anyhow::bail!(export_not_found_error(&path.display().to_string()));
    }

    let snapshot = load_snapshot(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    println!("{}", generate_report(&snapshot));
    Ok(())
}
