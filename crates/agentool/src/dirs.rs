//! Well-known directories and search-root construction.
//!
//! ```text
//! ~/.agentool/                    (ToolHome, or $AGENTOOL_HOME)
//! ├── config.toml                   (optional runtime settings)
//! └── tools/                        (user-level installed tools)
//!     └── @scope/name/1.2.3/agent.json
//!
//! <project>/.agentool/tools/      (project-local installed tools)
//! ```
//!
//! Search roots are probed in priority order:
//! 1. explicit caller override
//! 2. `$AGENTOOL_TOOL_DIR`
//! 3. `<project>/.agentool/tools`
//! 4. `<home>/tools`

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::env::{HOME_ENV, RuntimeEnv, TOOL_DIR_ENV};
use crate::error::{ToolError, ToolResult};

/// Name of the per-project and per-user state directory.
pub const STATE_DIR_NAME: &str = ".agentool";

/// User-level state directory (`~/.agentool/` or `$AGENTOOL_HOME`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHome {
    root: PathBuf,
}

impl ToolHome {
    /// Resolve the home directory.
    ///
    /// Checks `$AGENTOOL_HOME` first, then falls back to `$HOME/.agentool/`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Config`] if `$AGENTOOL_HOME` is relative, or if
    /// neither it nor a user home directory is set.
    pub fn resolve(env: &RuntimeEnv) -> ToolResult<Self> {
        let root = if let Some(custom) = env.var(HOME_ENV) {
            let p = PathBuf::from(custom);
            if !p.is_absolute() {
                return Err(ToolError::Config(format!(
                    "{HOME_ENV} must be an absolute path"
                )));
            }
            p
        } else {
            env.home_dir()
                .ok_or_else(|| {
                    ToolError::Config(format!(
                        "neither {HOME_ENV} nor HOME environment variable is set"
                    ))
                })?
                .join(STATE_DIR_NAME)
        };

        Ok(Self { root })
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installed tools directory (`~/.agentool/tools/`).
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }

    /// Runtime settings file (`~/.agentool/config.toml`).
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

/// Detect the project root by walking up from `start_dir`.
///
/// Detection order at each level:
/// 1. Directory containing `.agentool/`
/// 2. Directory containing `.git`
/// 3. Directory containing `package.json`
///
/// Falls back to `start_dir` itself when nothing matches.
#[must_use]
pub fn detect_project_root(start_dir: &Path) -> PathBuf {
    let mut current = start_dir;

    loop {
        if current.join(STATE_DIR_NAME).is_dir()
            || current.join(".git").exists()
            || current.join("package.json").is_file()
        {
            return current.to_path_buf();
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }

    start_dir.to_path_buf()
}

/// Project-local tools directory (`<project>/.agentool/tools`).
#[must_use]
pub fn project_tools_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR_NAME).join("tools")
}

/// Build the ordered, deduplicated list of search roots.
///
/// A missing user home is not an error here; the remaining roots are still
/// searched.
#[must_use]
pub fn search_roots(override_root: Option<&Path>, env: &RuntimeEnv) -> Vec<PathBuf> {
    let mut roots = Vec::with_capacity(4);

    if let Some(root) = override_root {
        roots.push(absolutize(root, env.cwd()));
    }
    if let Some(root) = env.var(TOOL_DIR_ENV) {
        roots.push(absolutize(Path::new(root), env.cwd()));
    }
    roots.push(project_tools_dir(&detect_project_root(env.cwd())));
    match ToolHome::resolve(env) {
        Ok(home) => roots.push(home.tools_dir()),
        Err(e) => debug!(error = %e, "Skipping user-level tool directory"),
    }

    let mut unique: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if !unique.contains(&root) {
            unique.push(root);
        }
    }
    unique
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_at(cwd: &Path) -> RuntimeEnv {
        RuntimeEnv::from_parts([("HOME".to_string(), "/home/user".to_string())], cwd)
    }

    #[test]
    fn home_layout() {
        let home = ToolHome::from_path("/home/user/.agentool");
        assert_eq!(home.tools_dir(), PathBuf::from("/home/user/.agentool/tools"));
        assert_eq!(
            home.config_path(),
            PathBuf::from("/home/user/.agentool/config.toml")
        );
    }

    #[test]
    fn home_resolution_prefers_override() {
        let env = env_at(Path::new("/")).with_var(HOME_ENV, "/opt/agentool");
        let home = ToolHome::resolve(&env).unwrap();
        assert_eq!(home.root(), Path::new("/opt/agentool"));

        let env = env_at(Path::new("/"));
        let home = ToolHome::resolve(&env).unwrap();
        assert_eq!(home.root(), Path::new("/home/user/.agentool"));
    }

    #[test]
    fn relative_home_override_is_rejected() {
        let env = env_at(Path::new("/")).with_var(HOME_ENV, "relative/dir");
        assert!(matches!(
            ToolHome::resolve(&env),
            Err(ToolError::Config(_))
        ));
    }

    #[test]
    fn project_root_found_by_walking_up() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(detect_project_root(&nested), tmp.path());
    }

    #[test]
    fn state_dir_beats_outer_git() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let inner = tmp.path().join("pkg");
        std::fs::create_dir_all(inner.join(STATE_DIR_NAME)).unwrap();

        assert_eq!(detect_project_root(&inner.join("src")), inner);
    }

    #[test]
    fn search_roots_priority_and_dedup() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let project_tools = project_tools_dir(tmp.path());

        let env = env_at(tmp.path()).with_var(TOOL_DIR_ENV, "/env/tools");
        let roots = search_roots(Some(Path::new("/explicit")), &env);
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/explicit"),
                PathBuf::from("/env/tools"),
                project_tools.clone(),
                PathBuf::from("/home/user/.agentool/tools"),
            ]
        );

        let env = env_at(tmp.path()).with_var(TOOL_DIR_ENV, project_tools.to_string_lossy());
        let roots = search_roots(None, &env);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0], project_tools);
    }

    #[test]
    fn relative_override_is_anchored_at_cwd() {
        let env = env_at(Path::new("/work"));
        let roots = search_roots(Some(Path::new("tools")), &env);
        assert_eq!(roots[0], PathBuf::from("/work/tools"));
    }

    #[test]
    fn missing_home_skips_user_root() {
        let tmp = tempfile::tempdir().unwrap();
        let env = RuntimeEnv::from_parts(Vec::new(), tmp.path());
        let roots = search_roots(None, &env);
        assert_eq!(roots.len(), 1);
    }
}
