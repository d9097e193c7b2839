//! Tool runtime error types.

use std::path::PathBuf;

/// Errors from resolving, loading, or invoking a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The package specifier is malformed.
    #[error("invalid specifier '{spec}': {reason}")]
    InvalidSpecifier {
        /// The offending specifier.
        spec: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No search root holds a manifest satisfying the version constraint.
    #[error("tool {spec} not found (searched: {})", display_paths(.searched))]
    NotFound {
        /// The specifier that was looked up.
        spec: String,
        /// Search roots probed, in priority order.
        searched: Vec<PathBuf>,
    },

    /// The manifest could not be parsed or lacks `entrypoint.command`.
    #[error("invalid manifest at {path}: {message}")]
    Manifest {
        /// Path to the manifest file.
        path: PathBuf,
        /// Parse or validation failure.
        message: String,
    },

    /// The entrypoint command is not an allowed interpreter.
    #[error("unsupported interpreter '{command}' (allowed: {allowed})")]
    UnsupportedInterpreter {
        /// The rejected command.
        command: String,
        /// Human-readable list of allowed interpreters.
        allowed: String,
    },

    /// The interpreter could not be found on the search path.
    #[error("interpreter '{command}' not found on PATH")]
    InterpreterNotFound {
        /// The missing command.
        command: String,
    },

    /// The manifest's declared runtime disagrees with the resolved command.
    #[error("runtime mismatch: manifest declares '{declared}' but command is '{command}'")]
    RuntimeMismatch {
        /// Declared `runtime.type`.
        declared: String,
        /// The resolved command.
        command: String,
    },

    /// The tool did not finish before its deadline.
    #[error("tool timed out after {timeout_ms}ms")]
    Timeout {
        /// The bound that elapsed.
        timeout_ms: u64,
    },

    /// Combined stdout + stderr exceeded the capture cap.
    #[error("tool output exceeded {limit} bytes")]
    OutputLimit {
        /// Cap in bytes.
        limit: usize,
    },

    /// The tool exited unsuccessfully.
    #[error("tool {}: {stderr_tail}", describe_exit(.code))]
    Execution {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Bounded tail of captured stderr.
        stderr_tail: String,
    },

    /// The tool exited with code 0 but its stdout held no parsable result.
    #[error("invalid tool output: {reason}\nstdout tail: {stdout_tail}\nstderr tail: {stderr_tail}")]
    OutputFormat {
        /// Extraction failure.
        reason: String,
        /// Bounded tail of captured stdout.
        stdout_tail: String,
        /// Bounded tail of captured stderr.
        stderr_tail: String,
    },

    /// No `{` was present in the text handed to the extractor.
    #[error("no JSON object found in output")]
    NoJsonFound,

    /// A `{` was present but no trailing slice parsed as a JSON object.
    #[error("malformed JSON result: {0}")]
    InvalidJson(String),

    /// The child process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The command that failed to start.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Runtime configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
