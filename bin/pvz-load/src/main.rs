//! ---
//! pvz_section: "06-cli"
//! pvz_subsection: "binary"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "Binary entrypoint for the PVZ load harness."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use pvz_load_common::config::{ExecutorKind, LoadTestConfig};
use pvz_load_common::logging::init_tracing;
use pvz_load_common::version::VersionInfo;
use pvz_load_core::LoadTestOrchestrator;
use pvz_load_rt::shutdown_channel;
use tokio::signal;
use tracing::{info, warn};
use url::Url;

/// Exit code when the run finished but a threshold was crossed.
const EXIT_THRESHOLDS_CROSSED: u8 = 99;
const EXIT_SETUP_ERROR: u8 = 1;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("pvz-load ", env!("CARGO_PKG_VERSION")),
    about = "Load tests for the PVZ pickup-point service",
    long_about = None
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "PVZ_LOAD_CONFIG",
        help = "Path to a TOML configuration file"
    )]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the load test")]
    Run(RunArgs),
    #[command(about = "Validate the configuration and print the effective settings")]
    Validate,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    #[arg(long, value_name = "URL", help = "Base URL of the PVZ service")]
    base_url: Option<Url>,

    #[arg(long, value_name = "N", help = "Iterations started per time unit")]
    rate: Option<u64>,

    #[arg(long, value_name = "DURATION", value_parser = parse_duration, help = "Run duration, e.g. 30s or 1m")]
    duration: Option<Duration>,

    #[arg(long, value_name = "N", help = "Run exactly N iterations instead of a timed run")]
    iterations: Option<u64>,

    #[arg(long, value_name = "FILE", help = "Write the end-of-run summary as JSON")]
    summary_export: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, config: &mut LoadTestConfig) {
        if let Some(base_url) = self.base_url {
            config.target.base_url = base_url;
        }
        if let Some(rate) = self.rate {
            config.executor.rate = rate;
        }
        if let Some(duration) = self.duration {
            config.executor.duration = duration;
        }
        if let Some(iterations) = self.iterations {
            config.executor.kind = ExecutorKind::FixedIterations;
            config.executor.iterations = iterations;
        }
        if let Some(path) = self.summary_export {
            config.report.summary_path = Some(path);
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return ExitCode::SUCCESS;
    }

    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_SETUP_ERROR)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let loaded = LoadTestConfig::load(cli.config.as_deref())?;
    let mut config = loaded.config;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Validate => {
            LoadTestOrchestrator::new(config.clone())?;
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate().context("invalid command-line overrides")?;
            init_tracing("pvz-load", &config.logging)?;
            if let Some(path) = &loaded.source {
                info!(config_path = %path.display(), "configuration loaded");
            }
            run(config).await
        }
    }
}

async fn run(config: LoadTestConfig) -> Result<ExitCode> {
    let orchestrator = LoadTestOrchestrator::new(config)?;
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping new iterations");
            trigger.trigger();
        }
    });

    let report = orchestrator.run(shutdown).await?;
    println!("{}", report.render_text());
    if report.passed {
        Ok(ExitCode::SUCCESS)
    } else {
        for crossed in report.failed_thresholds() {
            warn!(metric = %crossed.metric, expression = %crossed.expression, observed = crossed.observed, "threshold crossed");
        }
        Ok(ExitCode::from(EXIT_THRESHOLDS_CROSSED))
    }
}
