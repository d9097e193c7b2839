//! Loading tools into callables.
//!
//! [`load`] resolves a specifier to an installed version, reads its manifest,
//! and validates the interpreter once. The returned [`Tool`] can be called any
//! number of times, concurrently; each call runs in its own isolated process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, debug, info_span};

use crate::dirs::search_roots;
use crate::env::RuntimeEnv;
use crate::error::ToolResult;
use crate::executor::{ExecRequest, ProcessExecutor};
use crate::interpreter::{InterpreterResolver, ResolvedInterpreter};
use crate::locator::{FsLister, LocatedTool, ToolLocator};
use crate::manifest::Manifest;
use crate::settings::{ExecutionLimits, Settings};
use crate::spec::PackageSpec;

/// Options for [`load`] and friends.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Return metadata alongside the callable from [`load`].
    pub with_meta: bool,
    /// Timeout override; beats the manifest's `entrypoint.timeout_ms`.
    pub timeout_ms: Option<u64>,
    /// Search root probed ahead of every other root.
    pub tool_dir_override: Option<PathBuf>,
    /// Environment layered last into every invocation.
    pub env: BTreeMap<String, String>,
    /// Ambient environment; captured from the process when unset.
    pub runtime_env: Option<RuntimeEnv>,
    /// Execution limits; read from the settings file when unset.
    pub limits: Option<ExecutionLimits>,
}

impl LoadOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request metadata alongside the callable.
    #[must_use]
    pub fn with_meta(mut self, with_meta: bool) -> Self {
        self.with_meta = with_meta;
        self
    }

    /// Override the invocation timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Probe `dir` before every other search root.
    #[must_use]
    pub fn with_tool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_dir_override = Some(dir.into());
        self
    }

    /// Add a variable to every invocation's environment.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Use an explicit ambient environment instead of the process's.
    #[must_use]
    pub fn with_runtime_env(mut self, env: RuntimeEnv) -> Self {
        self.runtime_env = Some(env);
        self
    }

    /// Use explicit limits instead of the settings file.
    #[must_use]
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Snapshot of a tool's descriptive manifest fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMeta {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Request schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    /// Result schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
}

/// A loaded, validated tool.
///
/// Cheap to clone; clones share the resolved state.
#[derive(Debug, Clone)]
pub struct Tool {
    inner: Arc<ToolInner>,
}

#[derive(Debug)]
struct ToolInner {
    name: String,
    version: String,
    located: LocatedTool,
    manifest: Manifest,
    interpreter: ResolvedInterpreter,
    timeout: Duration,
    caller_env: BTreeMap<String, String>,
    executor: ProcessExecutor,
}

impl Tool {
    /// Invoke the tool with `payload` and return its result object.
    ///
    /// # Errors
    ///
    /// Any execution failure from
    /// [`ProcessExecutor::run`](crate::executor::ProcessExecutor::run).
    pub async fn call(&self, payload: Value) -> ToolResult<Value> {
        let inner = &self.inner;
        let span = info_span!("tool_call", tool = %inner.name, version = %inner.version);
        inner
            .executor
            .run(ExecRequest {
                tool_dir: &inner.located.tool_dir,
                entrypoint: &inner.manifest.entrypoint,
                interpreter: &inner.interpreter,
                payload: &payload,
                timeout: inner.timeout,
                caller_env: &inner.caller_env,
            })
            .instrument(span)
            .await
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Installed version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Installed version directory.
    #[must_use]
    pub fn tool_dir(&self) -> &Path {
        &self.inner.located.tool_dir
    }

    /// Where the tool was found.
    #[must_use]
    pub fn location(&self) -> &LocatedTool {
        &self.inner.located
    }

    /// The manifest read at load time.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.inner.manifest
    }

    /// The validated interpreter.
    #[must_use]
    pub fn interpreter(&self) -> &ResolvedInterpreter {
        &self.inner.interpreter
    }

    /// Effective per-invocation timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Metadata snapshot.
    #[must_use]
    pub fn meta(&self) -> ToolMeta {
        let manifest = &self.inner.manifest;
        ToolMeta {
            name: self.inner.name.clone(),
            version: self.inner.version.clone(),
            description: manifest.description.clone(),
            inputs: manifest.inputs.clone(),
            outputs: manifest.outputs.clone(),
        }
    }
}

/// A tool paired with its metadata.
#[derive(Debug, Clone)]
pub struct ToolWithMeta {
    /// The callable.
    pub tool: Tool,
    /// Metadata snapshot taken at load time.
    pub meta: ToolMeta,
}

/// Result of [`load`]: the shape is chosen by [`LoadOptions::with_meta`].
#[derive(Debug, Clone)]
pub enum LoadedTool {
    /// Callable only.
    Bare(Tool),
    /// Callable plus metadata.
    WithMeta(ToolWithMeta),
}

impl LoadedTool {
    /// The callable, whichever shape was loaded.
    #[must_use]
    pub fn tool(&self) -> &Tool {
        match self {
            Self::Bare(tool) | Self::WithMeta(ToolWithMeta { tool, .. }) => tool,
        }
    }

    /// Metadata, when requested.
    #[must_use]
    pub fn meta(&self) -> Option<&ToolMeta> {
        match self {
            Self::Bare(_) => None,
            Self::WithMeta(loaded) => Some(&loaded.meta),
        }
    }
}

/// Load a tool, returning the shape selected by `options.with_meta`.
///
/// # Errors
///
/// Returns the first failure among specifier parsing, location, manifest
/// reading, settings loading, and interpreter validation.
pub async fn load(spec: &str, options: LoadOptions) -> ToolResult<LoadedTool> {
    let with_meta = options.with_meta;
    let tool = load_tool(spec, options).await?;
    Ok(if with_meta {
        let meta = tool.meta();
        LoadedTool::WithMeta(ToolWithMeta { tool, meta })
    } else {
        LoadedTool::Bare(tool)
    })
}

/// Load a tool with its metadata, ignoring `options.with_meta`.
///
/// # Errors
///
/// See [`load`].
pub async fn load_with_meta(spec: &str, options: LoadOptions) -> ToolResult<ToolWithMeta> {
    let tool = load_tool(spec, options).await?;
    let meta = tool.meta();
    Ok(ToolWithMeta { tool, meta })
}

/// Load a bare callable, ignoring `options.with_meta`.
///
/// # Errors
///
/// See [`load`].
pub async fn load_tool(spec: &str, options: LoadOptions) -> ToolResult<Tool> {
    let spec = PackageSpec::parse(spec)?;
    let env = options
        .runtime_env
        .clone()
        .unwrap_or_else(RuntimeEnv::from_process);
    let limits = match options.limits.clone() {
        Some(limits) => limits,
        None => Settings::load(&env)?.limits,
    };

    let located = locate_with(&spec, &options, &env)?;
    let manifest = Manifest::read(&located.manifest_path)?;

    // Overrides and PATH may come from the manifest or the caller as well.
    let lookup_env = manifest
        .entrypoint
        .env
        .iter()
        .chain(&options.env)
        .fold(env.clone(), |acc, (k, v)| acc.with_var(k.clone(), v.clone()));
    let interpreter = InterpreterResolver::new(&lookup_env, &limits)
        .resolve(&manifest.entrypoint.command, manifest.runtime.as_ref())
        .await?;

    let timeout_ms = options
        .timeout_ms
        .or(manifest.entrypoint.timeout_ms)
        .unwrap_or(limits.default_timeout_ms);

    let (name, version) = identity(&spec, &located, &manifest);

    debug!(
        tool = %name,
        version = %version,
        timeout_ms,
        program = %interpreter.program.display(),
        "Loaded tool"
    );
    Ok(Tool {
        inner: Arc::new(ToolInner {
            name,
            version,
            located,
            manifest,
            interpreter,
            timeout: Duration::from_millis(timeout_ms),
            caller_env: options.env,
            executor: ProcessExecutor::new(env, limits),
        }),
    })
}

/// Locate a tool without loading it.
///
/// # Errors
///
/// Returns [`ToolError::InvalidSpecifier`](crate::ToolError::InvalidSpecifier)
/// or [`ToolError::NotFound`](crate::ToolError::NotFound).
pub fn resolve(spec: &str, options: &LoadOptions) -> ToolResult<LocatedTool> {
    let spec = PackageSpec::parse(spec)?;
    let env = options
        .runtime_env
        .clone()
        .unwrap_or_else(RuntimeEnv::from_process);
    locate_with(&spec, options, &env)
}

/// Read a tool's metadata without validating its interpreter.
///
/// # Errors
///
/// Returns the first failure among specifier parsing, location, and manifest
/// reading.
pub fn inspect(spec: &str, options: &LoadOptions) -> ToolResult<ToolMeta> {
    let spec = PackageSpec::parse(spec)?;
    let env = options
        .runtime_env
        .clone()
        .unwrap_or_else(RuntimeEnv::from_process);
    let located = locate_with(&spec, options, &env)?;
    let manifest = Manifest::read(&located.manifest_path)?;
    let (name, version) = identity(&spec, &located, &manifest);
    Ok(ToolMeta {
        name,
        version,
        description: manifest.description,
        inputs: manifest.inputs,
        outputs: manifest.outputs,
    })
}

/// Manifest name and version, falling back to the specifier and the
/// installed directory when the manifest leaves them out.
fn identity(spec: &PackageSpec, located: &LocatedTool, manifest: &Manifest) -> (String, String) {
    let name = if manifest.name.is_empty() {
        spec.full_name()
    } else {
        manifest.name.clone()
    };
    let version = if manifest.version.is_empty() {
        located.version.to_string()
    } else {
        manifest.version.clone()
    };
    (name, version)
}

fn locate_with(
    spec: &PackageSpec,
    options: &LoadOptions,
    env: &RuntimeEnv,
) -> ToolResult<LocatedTool> {
    let roots = search_roots(options.tool_dir_override.as_deref(), env);
    ToolLocator::new(roots, &FsLister).locate(spec)
}
