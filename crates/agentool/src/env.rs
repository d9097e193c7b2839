//! Explicit snapshot of the ambient process environment.
//!
//! Every component that needs environment variables or the working directory
//! takes a [`RuntimeEnv`] instead of reading process globals. Only
//! [`RuntimeEnv::from_process`] touches `std::env`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Base directory for user-level state (default `$HOME/.agentool`).
pub const HOME_ENV: &str = "AGENTOOL_HOME";
/// Tool directory override, probed ahead of the project and user roots.
pub const TOOL_DIR_ENV: &str = "AGENTOOL_TOOL_DIR";
/// Forced interpreter for the `node` family.
pub const NODE_INTERPRETER_ENV: &str = "AGENTOOL_NODE";
/// Forced interpreter for the `python` family.
pub const PYTHON_INTERPRETER_ENV: &str = "AGENTOOL_PYTHON";
/// Debug verbosity toggle.
pub const DEBUG_ENV: &str = "AGENTOOL_DEBUG";

/// Environment variables and working directory seen by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    vars: BTreeMap<String, String>,
    cwd: PathBuf,
}

impl RuntimeEnv {
    /// Capture the current process environment and working directory.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            cwd: std::env::current_dir().unwrap_or_default(),
        }
    }

    /// Build an environment from explicit parts (useful for testing).
    #[must_use]
    pub fn from_parts(
        vars: impl IntoIterator<Item = (String, String)>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vars: vars.into_iter().collect(),
            cwd: cwd.into(),
        }
    }

    /// Set a variable, replacing any previous value.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Remove a variable.
    #[must_use]
    pub fn without_var(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }

    /// Replace the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Look up a variable. Empty values count as unset.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// All variables.
    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// The working directory.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The user's home directory (`HOME`, or `USERPROFILE` on Windows).
    #[must_use]
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME")
            .or_else(|| self.var("USERPROFILE"))
            .map(PathBuf::from)
    }

    /// Whether the debug toggle is set to a truthy value.
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        self.var(DEBUG_ENV).is_some_and(is_truthy)
    }

    /// Value of the executable search path variable.
    ///
    /// Windows environments may spell it `Path`; the first match wins.
    #[must_use]
    pub fn search_path(&self) -> Option<&str> {
        self.var("PATH").or_else(|| {
            self.vars
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("PATH"))
                .map(|(_, v)| v.as_str())
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
