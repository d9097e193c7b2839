//! agentool CLI - run versioned agent tool packages from the shell.
//!
//! Results go to stdout as JSON; logs and diagnostics go to stderr.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use agentool::{ExecutionLimits, RuntimeEnv, Settings};
use agentool_telemetry::{LogConfig, LogFormat, setup_logging};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{RunArgs, info, resolve, run};

/// agentool - resolve and run agent tool packages
#[derive(Parser)]
#[command(name = "agentool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (also enabled by AGENTOOL_DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: pretty, compact (default) or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    /// Settings file (default: $AGENTOOL_HOME/config.toml)
    #[arg(long, global = true, env = "AGENTOOL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a tool and invoke it once
    Run {
        /// Package specifier, e.g. @scope/name@^1.0
        spec: String,

        /// Request payload as JSON text
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read the request payload from a file
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// Timeout override in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Search this directory before all others
        #[arg(long)]
        tool_dir: Option<PathBuf>,

        /// Extra environment for the tool process (KEY=VALUE, repeatable)
        #[arg(short = 'e', long = "env", value_parser = commands::parse_env_pair)]
        env: Vec<(String, String)>,
    },

    /// Show where a specifier resolves to
    Resolve {
        /// Package specifier
        spec: String,

        /// Search this directory before all others
        #[arg(long)]
        tool_dir: Option<PathBuf>,
    },

    /// Print a tool's metadata as JSON
    Info {
        /// Package specifier
        spec: String,

        /// Search this directory before all others
        #[arg(long)]
        tool_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = RuntimeEnv::from_process();

    let level = if cli.verbose || env.debug_enabled() {
        "debug"
    } else {
        "warn"
    };
    if let Err(e) = setup_logging(&LogConfig::new(level).with_format(cli.log_format)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Run {
            spec,
            input,
            input_file,
            timeout_ms,
            tool_dir,
            env: extra_env,
        } => {
            let limits = load_limits(cli.config.as_ref(), &env)?;
            run(RunArgs {
                spec,
                input,
                input_file,
                timeout_ms,
                tool_dir,
                extra_env,
                runtime_env: env,
                limits,
            })
            .await
        },
        Commands::Resolve { spec, tool_dir } => resolve(&spec, tool_dir, env),
        Commands::Info { spec, tool_dir } => info(&spec, tool_dir, env),
    }
}

fn load_limits(config: Option<&PathBuf>, env: &RuntimeEnv) -> Result<ExecutionLimits> {
    let settings = match config {
        Some(path) => Settings::load_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::load(env).context("failed to load settings")?,
    };
    Ok(settings.limits)
}
