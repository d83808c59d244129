//! # govern CLI entry point
//!
//! Parses command-line arguments, loads the engine configuration and
//! dispatches to subcommand handlers. Logs go to stderr so stdout carries
//! only command output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use govern_cli::evaluate::{run_evaluate, EvaluateArgs};
use govern_cli::policy::{run_policy, PolicyArgs};
use govern_cli::receipts::{run_receipts, ReceiptsArgs};
use govern_cli::redact::{run_redact, RedactArgs};
use govern_engine::EngineConfig;

/// Governance checks for AI-agent payloads.
///
/// Evaluates payloads against policy files, redacts PII, and signs an
/// auditable receipt for every decision. Configuration comes from `--config`
/// and the `GOVERN_*` environment variables.
#[derive(Parser, Debug)]
#[command(name = "govern", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a YAML or JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a JSON payload and print the decision and receipt.
    Evaluate(EvaluateArgs),

    /// Redact PII from text or a JSON document.
    Redact(RedactArgs),

    /// Validate and inspect policy files.
    Policy(PolicyArgs),

    /// Verify and query a receipt log.
    Receipts(ReceiptsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "govern CLI starting");

    let config = match EngineConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(1);
        }
    };
    tracing::debug!(?config, "loaded configuration");

    let result = match cli.command {
        Commands::Evaluate(args) => run_evaluate(&args, config),
        Commands::Redact(args) => run_redact(&args, &config),
        Commands::Policy(args) => run_policy(&args, &config),
        Commands::Receipts(args) => run_receipts(&args, config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
