//! Subcommand implementations.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use agentool::{ExecutionLimits, LoadOptions, RuntimeEnv, load_tool};
use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde_json::Value;
use tracing::debug;

/// Arguments for `agentool run`.
pub(crate) struct RunArgs {
    pub(crate) spec: String,
    pub(crate) input: Option<String>,
    pub(crate) input_file: Option<PathBuf>,
    pub(crate) timeout_ms: Option<u64>,
    pub(crate) tool_dir: Option<PathBuf>,
    pub(crate) extra_env: Vec<(String, String)>,
    pub(crate) runtime_env: RuntimeEnv,
    pub(crate) limits: ExecutionLimits,
}

/// Load a tool, invoke it once, and print the result as JSON.
pub(crate) async fn run(args: RunArgs) -> Result<()> {
    let payload = read_payload(args.input.as_deref(), args.input_file.as_ref())?;

    let mut options = LoadOptions::new()
        .with_runtime_env(args.runtime_env)
        .with_limits(args.limits);
    if let Some(timeout_ms) = args.timeout_ms {
        options = options.with_timeout_ms(timeout_ms);
    }
    if let Some(dir) = args.tool_dir {
        options = options.with_tool_dir(dir);
    }
    for (key, value) in args.extra_env {
        options = options.with_env(key, value);
    }

    let tool = load_tool(&args.spec, options)
        .await
        .with_context(|| format!("failed to load {}", args.spec))?;
    debug!(tool = %tool.name(), version = %tool.version(), "Invoking tool");

    let result = tool
        .call(payload)
        .await
        .with_context(|| format!("{}@{} failed", tool.name(), tool.version()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Print where a specifier resolves to.
pub(crate) fn resolve(spec: &str, tool_dir: Option<PathBuf>, env: RuntimeEnv) -> Result<()> {
    let located = agentool::resolve(spec, &options_for(tool_dir, env))?;
    println!("{} {}", "version: ".bold(), located.version);
    println!("{} {}", "root:    ".bold(), located.search_root.display());
    println!("{} {}", "tool dir:".bold(), located.tool_dir.display());
    println!("{} {}", "manifest:".bold(), located.manifest_path.display());
    Ok(())
}

/// Print a tool's metadata as JSON.
pub(crate) fn info(spec: &str, tool_dir: Option<PathBuf>, env: RuntimeEnv) -> Result<()> {
    let meta = agentool::inspect(spec, &options_for(tool_dir, env))?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn options_for(tool_dir: Option<PathBuf>, env: RuntimeEnv) -> LoadOptions {
    let options = LoadOptions::new().with_runtime_env(env);
    match tool_dir {
        Some(dir) => options.with_tool_dir(dir),
        None => options,
    }
}

/// Payload from `--input`, `--input-file`, or piped stdin; `{}` when stdin is
/// a terminal or empty.
fn read_payload(input: Option<&str>, input_file: Option<&PathBuf>) -> Result<Value> {
    let text = if let Some(text) = input {
        text.to_string()
    } else if let Some(path) = input_file {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    } else if std::io::stdin().is_terminal() {
        String::new()
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        buf
    };
    parse_payload(&text)
}

fn parse_payload(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(text).context("request payload is not valid JSON")
}

/// Parse a `KEY=VALUE` pair for `--env`.
pub(crate) fn parse_env_pair(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("expected KEY=VALUE, got '{raw}'");
    };
    if key.is_empty() {
        bail!("environment variable name is empty in '{raw}'");
    }
    Ok((key.to_string(), value.to_string()))
}
