use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::ExecError;

/// Result of a shell command execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run `command` with `sh -c` inside `cwd`.
///
/// The child gets its own process group; on timeout the whole group is
/// killed with SIGKILL and reaped, so background children do not outlive
/// the call. A timed-out result has no exit code.
pub async fn execute_shell(
    command: &str,
    cwd: &Path,
    timeout_secs: u64,
) -> anyhow::Result<ExecResult> {
    // process_group(0) requires the CommandExt trait on Unix.
    #[allow(unused_imports)]
    use std::os::unix::process::CommandExt;

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .process_group(0)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExecError::SpawnFailed(format!("`{command}`: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::ProcessFailed("stdout not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::ProcessFailed("stderr not captured".into()))?;
    let stdout_task = tokio::spawn(read_all(stdout));
    let stderr_task = tokio::spawn(read_all(stderr));

    let (exit_code, timed_out) = tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| ExecError::ProcessFailed(e.to_string()))?;
            (status.code(), false)
        }
        _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => {
            if let Some(pid) = child.id() {
                let pgid = nix::unistd::Pid::from_raw(pid as i32);
                let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
            }
            // Reap the child to prevent zombies.
            let _ = child.wait().await;
            tracing::warn!(command, timeout_secs, "Command timed out; process group killed");
            (None, true)
        }
    };

    Ok(ExecResult {
        stdout: stdout_task.await.unwrap_or_default(),
        stderr: stderr_task.await.unwrap_or_default(),
        exit_code,
        timed_out,
    })
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}
