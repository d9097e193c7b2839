//! Tool process execution.
//!
//! One call to [`ProcessExecutor::run`] spawns the interpreter in a fresh
//! [`RunContext`], writes the JSON request to stdin, captures stdout and
//! stderr under a combined byte cap, enforces the deadline by killing the
//! whole process tree, and extracts the result object from stdout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::env::RuntimeEnv;
use crate::error::{ToolError, ToolResult};
use crate::extract::extract_json;
use crate::interpreter::ResolvedInterpreter;
use crate::manifest::Entrypoint;
use crate::platform;
use crate::sandbox::{RunContext, build_args};
use crate::settings::ExecutionLimits;
use crate::truncate::tail_lossy;

/// How long to wait for a killed child to be reaped.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Read buffer size per stream.
const READ_CHUNK: usize = 8192;

/// Everything needed to launch one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    /// Installed tool directory; `entrypoint.cwd` is relative to it.
    pub tool_dir: &'a Path,
    /// Launch description from the manifest.
    pub entrypoint: &'a Entrypoint,
    /// Validated interpreter.
    pub interpreter: &'a ResolvedInterpreter,
    /// Request payload written to stdin.
    pub payload: &'a Value,
    /// Deadline for the whole invocation.
    pub timeout: Duration,
    /// Caller-supplied environment, layered last.
    pub caller_env: &'a BTreeMap<String, String>,
}

/// Raw output of a process that ran to completion.
#[derive(Debug)]
struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Spawns tool processes under [`ExecutionLimits`].
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    ambient: RuntimeEnv,
    limits: ExecutionLimits,
}

impl ProcessExecutor {
    /// Create an executor inheriting `PATH` and locale from `ambient`.
    #[must_use]
    pub fn new(ambient: RuntimeEnv, limits: ExecutionLimits) -> Self {
        Self { ambient, limits }
    }

    /// The limits applied to every invocation.
    #[must_use]
    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Run one invocation and return the extracted result object.
    ///
    /// The run directory is removed before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`ToolError::Io`] if the run directory cannot be created.
    /// - [`ToolError::Spawn`] if the interpreter cannot be started.
    /// - [`ToolError::Timeout`] if the deadline elapses.
    /// - [`ToolError::OutputLimit`] if stdout plus stderr exceed the cap.
    /// - [`ToolError::Execution`] on a non-zero exit.
    /// - [`ToolError::OutputFormat`] if stdout holds no trailing object.
    pub async fn run(&self, request: ExecRequest<'_>) -> ToolResult<Value> {
        let ctx = RunContext::create(&work_dir_for(request.tool_dir, request.entrypoint))?;
        let started = Instant::now();

        let outcome = self.run_in(&ctx, &request).await;
        ctx.cleanup();

        let captured = outcome?;
        let elapsed_ms = started.elapsed().as_millis();
        let tail_chars = self.limits.diagnostic_tail_chars;

        if !captured.status.success() {
            info!(
                code = ?captured.status.code(),
                elapsed_ms,
                "Tool exited unsuccessfully"
            );
            return Err(ToolError::Execution {
                code: captured.status.code(),
                stderr_tail: tail_lossy(&captured.stderr, tail_chars),
            });
        }

        let stdout = String::from_utf8_lossy(&captured.stdout);
        let value = extract_json(&stdout).map_err(|e| ToolError::OutputFormat {
            reason: e.to_string(),
            stdout_tail: tail_lossy(&captured.stdout, tail_chars),
            stderr_tail: tail_lossy(&captured.stderr, tail_chars),
        })?;

        info!(
            elapsed_ms,
            stdout_bytes = captured.stdout.len(),
            stderr_bytes = captured.stderr.len(),
            "Tool finished"
        );
        Ok(value)
    }

    async fn run_in(&self, ctx: &RunContext, request: &ExecRequest<'_>) -> ToolResult<Captured> {
        let interpreter = request.interpreter;
        let env = ctx.child_env(&self.ambient, &request.entrypoint.env, request.caller_env);
        let args = build_args(
            interpreter.family,
            &request.entrypoint.args,
            self.limits.node_memory_mb,
        );

        let mut std_cmd = std::process::Command::new(&interpreter.program);
        std_cmd
            .args(&args)
            .current_dir(ctx.work_dir())
            .env_clear()
            .envs(&env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        platform::isolate_process_group(&mut std_cmd);

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(true);

        debug!(
            program = %interpreter.program.display(),
            args = ?args,
            cwd = %ctx.work_dir().display(),
            "Spawning tool process"
        );
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            command: interpreter.command.clone(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(request.payload)
                .map_err(|e| ToolError::Io(std::io::Error::other(e)))?;
            // Write errors surface later as an exit status or missing output.
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(error = %e, "Failed to write request to tool stdin");
                }
                let _ = stdin.shutdown().await;
            });
        }

        self.collect(&mut child, request.timeout).await
    }

    /// Drain both streams and wait for exit, enforcing the cap and deadline.
    async fn collect(&self, child: &mut Child, timeout: Duration) -> ToolResult<Captured> {
        let limit = self.limits.output_limit_bytes;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let relay_stderr = self.ambient.debug_enabled();

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("tool stdout not captured"))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("tool stderr not captured"))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut stdout_buf = [0u8; READ_CHUNK];
        let mut stderr_buf = [0u8; READ_CHUNK];
        let mut stdout_open = true;
        let mut stderr_open = true;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout_pipe.read(&mut stdout_buf), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => stdout.extend_from_slice(&stdout_buf[..n]),
                    Err(e) => {
                        debug!(error = %e, "Tool stdout read failed");
                        stdout_open = false;
                    },
                },
                read = stderr_pipe.read(&mut stderr_buf), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => {
                        if relay_stderr {
                            debug!(
                                target: "agentool::tool_stderr",
                                "{}",
                                String::from_utf8_lossy(&stderr_buf[..n]).trim_end()
                            );
                        }
                        stderr.extend_from_slice(&stderr_buf[..n]);
                    },
                    Err(e) => {
                        debug!(error = %e, "Tool stderr read failed");
                        stderr_open = false;
                    },
                },
                () = &mut deadline => {
                    warn!(timeout_ms, "Tool timed out; killing process tree");
                    terminate(child).await;
                    return Err(ToolError::Timeout { timeout_ms });
                },
            }

            if stdout.len().saturating_add(stderr.len()) > limit {
                warn!(limit, "Tool output limit exceeded; killing process tree");
                terminate(child).await;
                return Err(ToolError::OutputLimit { limit });
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            () = &mut deadline => {
                warn!(timeout_ms, "Tool timed out after closing its streams; killing process tree");
                terminate(child).await;
                return Err(ToolError::Timeout { timeout_ms });
            },
        };

        Ok(Captured {
            status,
            stdout,
            stderr,
        })
    }
}

/// Kill the process tree and reap the child, bounded by [`REAP_GRACE`].
async fn terminate(child: &mut Child) {
    platform::kill_tree(child);
    if tokio::time::timeout(REAP_GRACE, child.wait()).await.is_err() {
        warn!("Killed tool process was not reaped in time");
    }
}

/// Resolve the working directory a tool process runs in.
#[must_use]
pub fn work_dir_for(tool_dir: &Path, entrypoint: &Entrypoint) -> PathBuf {
    match &entrypoint.cwd {
        Some(cwd) => tool_dir.join(cwd),
        None => tool_dir.to_path_buf(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::interpreter::InterpreterFamily;
    use serde_json::json;

    /// `/bin/sh` stands in for an interpreter so these run everywhere.
    fn shell() -> ResolvedInterpreter {
        ResolvedInterpreter {
            command: "sh".into(),
            program: PathBuf::from("/bin/sh"),
            family: InterpreterFamily::Python,
        }
    }

    fn script_entrypoint(script: &str) -> Entrypoint {
        Entrypoint {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: None,
            timeout_ms: None,
            env: BTreeMap::new(),
        }
    }

    fn executor(limits: ExecutionLimits) -> ProcessExecutor {
        let ambient = RuntimeEnv::from_parts(
            [("PATH".to_string(), "/usr/bin:/bin".to_string())],
            "/",
        );
        ProcessExecutor::new(ambient, limits)
    }

    async fn run_script(
        exec: &ProcessExecutor,
        dir: &Path,
        script: &str,
        timeout: Duration,
    ) -> ToolResult<Value> {
        let interpreter = shell();
        let entrypoint = script_entrypoint(script);
        let payload = json!({"text": "hello"});
        let caller_env = BTreeMap::new();
        exec.run(ExecRequest {
            tool_dir: dir,
            entrypoint: &entrypoint,
            interpreter: &interpreter,
            payload: &payload,
            timeout,
            caller_env: &caller_env,
        })
        .await
    }

    #[tokio::test]
    async fn echoes_stdin_after_noise() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits::default());
        let value = run_script(
            &exec,
            tmp.path(),
            "echo 'stdout noise before json'; cat",
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(value, json!({"text": "hello"}));
        assert!(!tmp.path().join("run").exists());
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits::default());
        let err = run_script(&exec, tmp.path(), "echo boom >&2; exit 2", Duration::from_secs(10))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exited with code 2"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[tokio::test]
    async fn stderr_tail_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits {
            diagnostic_tail_chars: 10,
            ..ExecutionLimits::default()
        });
        let err = run_script(
            &exec,
            tmp.path(),
            "printf 'aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaEND' >&2; exit 1",
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        match err {
            ToolError::Execution { stderr_tail, .. } => {
                assert_eq!(stderr_tail.chars().count(), 10);
                assert!(stderr_tail.ends_with("END"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits::default());
        let started = Instant::now();
        let err = run_script(&exec, tmp.path(), "sleep 30", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_ms: 200 }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!tmp.path().join("run").exists());
    }

    #[tokio::test]
    async fn output_limit_fires_before_deadline() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits {
            output_limit_bytes: 64 * 1024,
            ..ExecutionLimits::default()
        });
        let started = Instant::now();
        let err = run_script(
            &exec,
            tmp.path(),
            "while :; do echo xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx; done",
            Duration::from_secs(30),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::OutputLimit { limit: 65536 }));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn missing_result_is_output_format_error() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits::default());
        let err = run_script(&exec, tmp.path(), "echo no result here", Duration::from_secs(10))
            .await
            .unwrap_err();
        match err {
            ToolError::OutputFormat { stdout_tail, .. } => {
                assert!(stdout_tail.contains("no result here"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn child_sees_private_home_and_tmp() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = executor(ExecutionLimits::default());
        let value = run_script(
            &exec,
            tmp.path(),
            r#"printf '{"home":"%s","tmp":"%s","cwd":"%s"}' "$HOME" "$TMPDIR" "$(pwd)""#,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        let run_base = tmp.path().join("run");
        let home = value["home"].as_str().unwrap();
        let tmpdir = value["tmp"].as_str().unwrap();
        assert!(Path::new(home).starts_with(&run_base), "{home}");
        assert!(home.ends_with("home"));
        assert!(tmpdir.ends_with("tmp"));
        assert!(!run_base.exists());
    }

    #[tokio::test]
    async fn entrypoint_cwd_is_relative_to_tool_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("dist")).unwrap();
        let exec = executor(ExecutionLimits::default());

        let interpreter = shell();
        let mut entrypoint = script_entrypoint(r#"printf '{"cwd":"%s"}' "$(pwd)""#);
        entrypoint.cwd = Some(PathBuf::from("dist"));
        let caller_env = BTreeMap::new();
        let value = exec
            .run(ExecRequest {
                tool_dir: tmp.path(),
                entrypoint: &entrypoint,
                interpreter: &interpreter,
                payload: &Value::Null,
                timeout: Duration::from_secs(10),
                caller_env: &caller_env,
            })
            .await
            .unwrap();

        let cwd = std::fs::canonicalize(value["cwd"].as_str().unwrap()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(tmp.path().join("dist")).unwrap());
    }
}
