//! Incident timeline ingester: binary entrypoint.
//! Loads config, wires HTTP collaborators and runs the pipeline once or on an interval.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use incident_timeline::bootstrap::build_pipeline;
use incident_timeline::ingest::scheduler::run_every;
use incident_timeline::{load_config_default, load_config_from, PipelineConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Config file (TOML or JSON). Defaults to $TIMELINE_CONFIG_PATH, then
    /// config/timeline.{toml,json}.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One pass over all sources.
    Run {
        /// Read the live store but keep appends in memory.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run every N seconds until interrupted.
    Watch {
        #[arg(long, value_name = "SECS")]
        every: u64,
        #[arg(long)]
        dry_run: bool,
    },
    /// Load and validate the config, then exit.
    CheckConfig,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("incident_timeline=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(p) => load_config_from(p),
        None => load_config_default(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::CheckConfig => {
            tracing::info!(
                sources = config.sources.len(),
                enabled = config.sources.iter().filter(|s| s.enabled).count(),
                translation = config.translation.is_some(),
                "config ok"
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { dry_run } => {
            let pipeline = build_pipeline(config, dry_run).await?;
            let report = pipeline.run().await;
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Watch { every, dry_run } => {
            anyhow::ensure!(every > 0, "--every must be at least 1 second");
            let pipeline = build_pipeline(config, dry_run).await?;
            let mut failed = 0usize;
            tokio::select! {
                _ = run_every(&pipeline, Duration::from_secs(every), None, |r| {
                    if !r.is_success() {
                        failed += 1;
                    }
                }) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted; stopping scheduler");
                }
            }
            tracing::info!(failed_runs = failed, "watch stopped");
            Ok(ExitCode::SUCCESS)
        }
    }
}
