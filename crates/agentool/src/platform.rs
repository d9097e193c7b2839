//! Platform-specific process-tree control for tool processes.
//!
//! - **Unix**: the child leads its own process group; termination signals the
//!   whole group with `SIGKILL`.
//! - **Other**: descendants are found by walking a process snapshot by parent
//!   PID and killed one by one.
//!
//! Both paths finish with a direct kill of the child itself, which covers a
//! group signal refused for lack of permission.

use tokio::process::Child;
use tracing::debug;

/// Put the command's child in a new process group led by itself.
#[cfg(unix)]
pub(crate) fn isolate_process_group(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;

    cmd.process_group(0);
}

/// Process groups are not available; descendants are tracked at kill time.
#[cfg(not(unix))]
pub(crate) fn isolate_process_group(_cmd: &mut std::process::Command) {}

/// Forcefully terminate `child` and every process it spawned.
pub(crate) fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_descendants(pid);
    }
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Direct kill failed (process may have exited)");
    }
}

#[cfg(unix)]
fn kill_descendants(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid = raw, "Killed process group"),
        Err(e) => debug!(pgid = raw, error = %e, "Process group kill failed"),
    }
}

#[cfg(not(unix))]
fn kill_descendants(pid: u32) {
    let registry = ProcessRegistry::snapshot();
    for descendant in registry.descendants_of(pid) {
        registry.kill(descendant);
    }
}

/// Snapshot of live processes keyed by PID, used to find a child's
/// descendants where process groups are unavailable.
#[cfg(not(unix))]
struct ProcessRegistry {
    system: sysinfo::System,
}

#[cfg(not(unix))]
impl ProcessRegistry {
    fn snapshot() -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_processes();
        Self { system }
    }

    /// Every transitive descendant of `root`, parents before children.
    fn descendants_of(&self, root: u32) -> Vec<sysinfo::Pid> {
        let mut found = Vec::new();
        let mut frontier = vec![sysinfo::Pid::from_u32(root)];
        while let Some(parent) = frontier.pop() {
            for (pid, process) in self.system.processes() {
                if process.parent() == Some(parent) && !found.contains(pid) {
                    found.push(*pid);
                    frontier.push(*pid);
                }
            }
        }
        found
    }

    fn kill(&self, pid: sysinfo::Pid) {
        if let Some(process) = self.system.process(pid) {
            let killed = process.kill();
            debug!(pid = %pid, killed, "Killed descendant process");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

    #[tokio::test]
    async fn kill_tree_reaches_grandchildren() {
        // The backgrounded sleep inherits stdout, so EOF only arrives once it
        // is dead too.
        let mut cmd = std::process::Command::new("/bin/sh");
        cmd.arg("-c")
            .arg("sleep 30 & echo started; wait")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        isolate_process_group(&mut cmd);
        let mut child = tokio::process::Command::from(cmd).spawn().unwrap();

        let mut stdout = BufReader::new(child.stdout.take().unwrap());
        let mut line = String::new();
        stdout.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "started");

        kill_tree(&mut child);
        child.wait().await.unwrap();

        let mut rest = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stdout.read_to_end(&mut rest))
            .await
            .expect("grandchild kept stdout open after group kill")
            .unwrap();
    }
}
