//! Runtime settings loaded from `~/.agentool/config.toml`.
//!
//! ```toml
//! [limits]
//! default_timeout_ms = 120000
//! output_limit_bytes = 10485760
//! diagnostic_tail_chars = 4000
//! node_memory_mb = 512
//! probe_timeout_ms = 5000
//! ```
//!
//! Every field is optional. A missing file yields the defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dirs::ToolHome;
use crate::env::RuntimeEnv;
use crate::error::{ToolError, ToolResult};

/// Default invocation timeout when neither the caller nor the manifest sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Combined stdout + stderr cap per invocation (10 MiB).
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 10 * 1024 * 1024;
/// Characters of captured output kept in error diagnostics.
pub const DEFAULT_DIAGNOSTIC_TAIL_CHARS: usize = 4000;
/// Heap cap handed to `node` via `--max-old-space-size`.
pub const DEFAULT_NODE_MEMORY_MB: u32 = 512;
/// Bound on the interpreter `--version` probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;

/// Maximum allowed settings file size (1 MB).
const MAX_SETTINGS_FILE_SIZE: u64 = 1_048_576;

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resource limits applied to every invocation.
    pub limits: ExecutionLimits,
}

/// Bounds applied to tool processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Timeout used when neither the caller nor the manifest sets one.
    pub default_timeout_ms: u64,
    /// Combined stdout + stderr byte cap.
    pub output_limit_bytes: usize,
    /// Characters of stderr/stdout kept in error messages.
    pub diagnostic_tail_chars: usize,
    /// `--max-old-space-size` value injected for the node family.
    pub node_memory_mb: u32,
    /// Bound on the secondary interpreter availability probe.
    pub probe_timeout_ms: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            diagnostic_tail_chars: DEFAULT_DIAGNOSTIC_TAIL_CHARS,
            node_memory_mb: DEFAULT_NODE_MEMORY_MB,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl ExecutionLimits {
    /// Probe bound as a [`Duration`].
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Settings {
    /// Load settings from the resolved home directory.
    ///
    /// A missing home or missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Config`] if the file exists but cannot be parsed.
    pub fn load(env: &RuntimeEnv) -> ToolResult<Self> {
        match ToolHome::resolve(env) {
            Ok(home) => Self::load_file(&home.config_path()),
            Err(e) => {
                debug!(error = %e, "No tool home; using default settings");
                Ok(Self::default())
            },
        }
    }

    /// Load settings from a specific file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Config`] if the file is oversized, unreadable, or
    /// not valid TOML for this schema.
    pub fn load_file(path: &Path) -> ToolResult<Self> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file; using defaults");
                return Ok(Self::default());
            },
            Err(e) => {
                return Err(ToolError::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            },
        };
        if metadata.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(ToolError::Config(format!(
                "{} is {} bytes, exceeding the {MAX_SETTINGS_FILE_SIZE} byte limit",
                path.display(),
                metadata.len()
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolError::Config(format!("failed to read {}: {e}", path.display())))?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| ToolError::Config(format!("failed to parse {}: {e}", path.display())))?;

        debug!(path = %path.display(), limits = ?settings.limits, "Loaded settings");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.default_timeout_ms, 120_000);
        assert_eq!(limits.output_limit_bytes, 10_485_760);
        assert_eq!(limits.diagnostic_tail_chars, 4000);
        assert_eq!(limits.probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load_file(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[limits]\ndefault_timeout_ms = 3000\n").unwrap();

        let settings = Settings::load_file(&path).unwrap();
        assert_eq!(settings.limits.default_timeout_ms, 3000);
        assert_eq!(settings.limits.node_memory_mb, DEFAULT_NODE_MEMORY_MB);
    }

    #[test]
    fn unparsable_file_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[limits\n").unwrap();
        assert!(matches!(
            Settings::load_file(&path),
            Err(ToolError::Config(_))
        ));
    }

    #[test]
    fn load_uses_home_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[limits]\nnode_memory_mb = 256\n",
        )
        .unwrap();
        let env = RuntimeEnv::from_parts(
            [(
                crate::env::HOME_ENV.to_string(),
                tmp.path().to_string_lossy().into_owned(),
            )],
            tmp.path(),
        );
        assert_eq!(Settings::load(&env).unwrap().limits.node_memory_mb, 256);
    }
}
