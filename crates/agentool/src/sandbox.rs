//! Per-invocation isolation for tool processes.
//!
//! Each invocation gets a fresh run directory under `<work_dir>/run/`:
//!
//! ```text
//! <work_dir>/run/run-XXXXXX/
//! ├── home/   ($HOME for the child)
//! └── tmp/    ($TMPDIR for the child)
//! ```
//!
//! The directory is a [`TempDir`], so it is removed when the context is
//! dropped even if the invocation future is cancelled.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::env::RuntimeEnv;
use crate::error::ToolResult;
use crate::interpreter::InterpreterFamily;

/// Subdirectory of the working directory holding run directories.
pub const RUN_DIR_NAME: &str = "run";

/// Flag capping the V8 old-generation heap.
pub const NODE_MEMORY_FLAG: &str = "--max-old-space-size";

/// Locale variables copied from the ambient environment when set.
const LOCALE_PASSTHROUGH: &[&str] = &["LANG"];

/// Variables the Windows loader needs to find executables and DLLs.
#[cfg(windows)]
const PLATFORM_PASSTHROUGH: &[&str] = &["PATHEXT", "SystemRoot", "SYSTEMROOT", "ComSpec"];
#[cfg(not(windows))]
const PLATFORM_PASSTHROUGH: &[&str] = &[];

/// Ephemeral state owned by exactly one invocation.
#[derive(Debug)]
pub struct RunContext {
    run_dir: TempDir,
    work_dir: PathBuf,
    home: PathBuf,
    tmp: PathBuf,
}

impl RunContext {
    /// Create a unique run directory with private `home` and `tmp` under
    /// `<work_dir>/run/`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Io`](crate::ToolError::Io) if any directory
    /// cannot be created.
    pub fn create(work_dir: &Path) -> ToolResult<Self> {
        let base = work_dir.join(RUN_DIR_NAME);
        let mut attempts = 0u8;
        let run_dir = loop {
            std::fs::create_dir_all(&base)?;
            match tempfile::Builder::new().prefix("run-").tempdir_in(&base) {
                Ok(dir) => break dir,
                // A sibling's cleanup removed the empty base in between.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && attempts < 3 => {
                    attempts = attempts.saturating_add(1);
                },
                Err(e) => return Err(e.into()),
            }
        };

        let home = run_dir.path().join("home");
        let tmp = run_dir.path().join("tmp");
        std::fs::create_dir(&home)?;
        std::fs::create_dir(&tmp)?;

        debug!(run_dir = %run_dir.path().display(), "Created run directory");
        Ok(Self {
            run_dir,
            work_dir: work_dir.to_path_buf(),
            home,
            tmp,
        })
    }

    /// Root of this invocation's run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        self.run_dir.path()
    }

    /// The child's working directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Private `$HOME`.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Private `$TMPDIR`.
    #[must_use]
    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Build the child's environment.
    ///
    /// Layers, each overriding the previous:
    /// 1. ambient `PATH` (plus loader variables on Windows)
    /// 2. private `HOME` / `TMPDIR`
    /// 3. ambient locale (`LANG`) when set
    /// 4. manifest `entrypoint.env`
    /// 5. caller-supplied env
    #[must_use]
    pub fn child_env(
        &self,
        ambient: &RuntimeEnv,
        manifest_env: &BTreeMap<String, String>,
        caller_env: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();

        if let Some(path) = ambient.search_path() {
            env.insert("PATH".to_string(), path.to_string());
        }
        for key in PLATFORM_PASSTHROUGH {
            if let Some(value) = ambient.var(key) {
                env.insert((*key).to_string(), value.to_string());
            }
        }

        let home = self.home.to_string_lossy().into_owned();
        let tmp = self.tmp.to_string_lossy().into_owned();
        env.insert("HOME".to_string(), home.clone());
        env.insert("TMPDIR".to_string(), tmp.clone());
        if cfg!(windows) {
            env.insert("USERPROFILE".to_string(), home);
            env.insert("TEMP".to_string(), tmp.clone());
            env.insert("TMP".to_string(), tmp);
        }

        for key in LOCALE_PASSTHROUGH {
            if let Some(value) = ambient.var(key) {
                env.insert((*key).to_string(), value.to_string());
            }
        }

        env.extend(manifest_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.extend(caller_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Remove the run directory, and the `run/` base if it is now empty.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn cleanup(self) {
        let path = self.run_dir.path().to_path_buf();
        if let Err(e) = self.run_dir.close() {
            warn!(run_dir = %path.display(), error = %e, "Failed to remove run directory");
            return;
        }
        // Only succeeds when no concurrent invocation still owns a sibling.
        let _ = std::fs::remove_dir(self.work_dir.join(RUN_DIR_NAME));
        debug!(run_dir = %path.display(), "Removed run directory");
    }
}

/// Argument list for the interpreter.
///
/// The node family gets `--max-old-space-size=<mb>` ahead of the manifest
/// arguments unless one of them already sets it.
#[must_use]
pub fn build_args(family: InterpreterFamily, args: &[String], node_memory_mb: u32) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len().saturating_add(1));
    if family == InterpreterFamily::Node && !args.iter().any(|a| a.starts_with(NODE_MEMORY_FLAG)) {
        out.push(format!("{NODE_MEMORY_FLAG}={node_memory_mb}"));
    }
    out.extend(args.iter().cloned());
    out
}
