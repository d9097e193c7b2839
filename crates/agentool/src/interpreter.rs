//! Interpreter resolution and validation.
//!
//! An entrypoint command goes through five steps before a tool may run:
//!
//! 1. family inference from the command's base name (or the declared runtime)
//! 2. substitution of `$AGENTOOL_NODE` / `$AGENTOOL_PYTHON` when set
//! 3. whitelist check of the canonical name
//! 4. lookup on the merged `PATH`, confirmed by a `--version` probe on a miss
//! 5. consistency with the manifest's declared `runtime.type`

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tracing::debug;

use crate::env::{NODE_INTERPRETER_ENV, PYTHON_INTERPRETER_ENV, RuntimeEnv};
use crate::error::{ToolError, ToolResult};
use crate::manifest::RuntimeDecl;
use crate::settings::ExecutionLimits;

/// Interpreter names accepted verbatim. `python3.<minor>` is accepted too.
pub const ALLOWED_INTERPRETERS: &[&str] = &["node", "nodejs", "python", "python3"];

/// Platform executable suffixes ignored when comparing names.
const EXECUTABLE_SUFFIXES: &[&str] = &[".exe", ".cmd", ".bat"];

/// Broad interpreter category used for overrides and runtime checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpreterFamily {
    /// `node`, `nodejs`.
    Node,
    /// `python`, `python3`, `python3.<minor>`.
    Python,
}

impl InterpreterFamily {
    /// Classify a name (command base name or runtime type).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match canonical_name(name).as_str() {
            "node" | "nodejs" => Some(Self::Node),
            "python" | "python3" => Some(Self::Python),
            other if is_python3_minor(other) => Some(Self::Python),
            _ => None,
        }
    }

    /// Environment variable that forces an interpreter for this family.
    #[must_use]
    pub fn override_var(self) -> &'static str {
        match self {
            Self::Node => NODE_INTERPRETER_ENV,
            Self::Python => PYTHON_INTERPRETER_ENV,
        }
    }

    /// Family name as written in manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for InterpreterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased base name with any platform executable suffix removed.
///
/// `/usr/bin/Python3.EXE` becomes `python3`.
#[must_use]
pub fn canonical_name(command: &str) -> String {
    let base = command
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(command)
        .to_ascii_lowercase();
    EXECUTABLE_SUFFIXES
        .iter()
        .find_map(|suffix| base.strip_suffix(suffix))
        .map_or_else(|| base.clone(), str::to_string)
}

/// Whether `canonical` is on the interpreter whitelist.
#[must_use]
pub fn is_allowed(canonical: &str) -> bool {
    ALLOWED_INTERPRETERS.contains(&canonical) || is_python3_minor(canonical)
}

fn is_python3_minor(name: &str) -> bool {
    name.strip_prefix("python3.")
        .is_some_and(|minor| !minor.is_empty() && minor.chars().all(|c| c.is_ascii_digit()))
}

/// Whether a declared runtime and a command name the same interpreter.
///
/// Holds for case-insensitive equality of canonical names and for any two
/// names in the same family (`python` and `python3`, `node` and `nodejs`).
#[must_use]
pub fn is_interpreter_match(runtime: &str, command: &str) -> bool {
    let runtime = canonical_name(runtime.trim());
    let command = canonical_name(command.trim());
    if runtime == command {
        return true;
    }
    match (
        InterpreterFamily::from_name(&runtime),
        InterpreterFamily::from_name(&command),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// A validated interpreter ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterpreter {
    /// Command after any override substitution, as written.
    pub command: String,
    /// Absolute path when the `PATH` lookup succeeded, else `command` as-is
    /// (confirmed by the version probe).
    pub program: PathBuf,
    /// Family of the resolved command.
    pub family: InterpreterFamily,
}

/// Resolves and validates entrypoint commands against a [`RuntimeEnv`].
#[derive(Debug, Clone)]
pub struct InterpreterResolver<'a> {
    env: &'a RuntimeEnv,
    limits: &'a ExecutionLimits,
}

impl<'a> InterpreterResolver<'a> {
    /// Create a resolver reading overrides and `PATH` from `env`.
    #[must_use]
    pub fn new(env: &'a RuntimeEnv, limits: &'a ExecutionLimits) -> Self {
        Self { env, limits }
    }

    /// Resolve `command`, checking it against `runtime` when declared.
    ///
    /// # Errors
    ///
    /// - [`ToolError::UnsupportedInterpreter`] if the (possibly overridden)
    ///   command is not on the whitelist.
    /// - [`ToolError::InterpreterNotFound`] if neither the `PATH` lookup nor
    ///   the version probe finds it.
    /// - [`ToolError::RuntimeMismatch`] if the declared runtime names another
    ///   family.
    pub async fn resolve(
        &self,
        command: &str,
        runtime: Option<&RuntimeDecl>,
    ) -> ToolResult<ResolvedInterpreter> {
        let inferred = InterpreterFamily::from_name(command)
            .or_else(|| runtime.and_then(|r| InterpreterFamily::from_name(&r.kind)));

        let command = match inferred.and_then(|f| self.env.var(f.override_var())) {
            Some(forced) => {
                debug!(original = %command, forced = %forced, "Interpreter override applied");
                forced.to_string()
            },
            None => command.to_string(),
        };

        let canonical = canonical_name(&command);
        let family = match InterpreterFamily::from_name(&canonical) {
            Some(family) if is_allowed(&canonical) => family,
            _ => {
                return Err(ToolError::UnsupportedInterpreter {
                    command,
                    allowed: format!("{}, python3.<minor>", ALLOWED_INTERPRETERS.join(", ")),
                });
            },
        };

        let program = match self.lookup(&command) {
            Some(path) => path,
            None if self.probe(&command).await => PathBuf::from(&command),
            None => return Err(ToolError::InterpreterNotFound { command }),
        };

        if let Some(runtime) = runtime
            && !is_interpreter_match(&runtime.kind, &canonical)
        {
            return Err(ToolError::RuntimeMismatch {
                declared: runtime.kind.clone(),
                command,
            });
        }

        debug!(
            command = %command,
            program = %program.display(),
            family = %family,
            "Resolved interpreter"
        );
        Ok(ResolvedInterpreter {
            command,
            program,
            family,
        })
    }

    /// Look `command` up on the merged `PATH`. Commands containing a path
    /// separator are resolved against the working directory instead.
    fn lookup(&self, command: &str) -> Option<PathBuf> {
        let result = match self.env.search_path() {
            Some(path) => which::which_in(command, Some(path), self.env.cwd()),
            None => which::which_in(command, None::<&str>, self.env.cwd()),
        };
        match result {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(command = %command, error = %e, "PATH lookup missed");
                None
            },
        }
    }

    /// Run `<command> --version` under the probe bound. Any successful spawn
    /// that exits in time counts as present.
    async fn probe(&self, command: &str) -> bool {
        let mut cmd = tokio::process::Command::new(command);
        cmd.arg("--version")
            .env_clear()
            .envs(self.env.vars())
            .current_dir(self.env.cwd())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let Ok(mut child) = cmd.spawn() else {
            debug!(command = %command, "Version probe could not spawn");
            return false;
        };
        match tokio::time::timeout(self.limits.probe_timeout(), child.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %command, status = %status, "Version probe finished");
                true
            },
            Ok(Err(e)) => {
                debug!(command = %command, error = %e, "Version probe failed");
                false
            },
            Err(_) => {
                debug!(command = %command, "Version probe timed out");
                false
            },
        }
    }
}
