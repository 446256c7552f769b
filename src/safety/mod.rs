pub mod command_filter;
pub mod defaults;
pub mod workspace;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use command_filter::{BlockedCommand, CommandFilter};
use workspace::{WorkspaceGuard, is_plain_component};

use crate::agent::logging::now_iso;
use crate::config::AppConfig;
use crate::error::GuardrailError;
use crate::exec::{ExecResult, execute_shell};

/// Source lines that hand a string to a shell.
static SHELL_OUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(os\.system|os\.popen|subprocess\.|child_process|execSync|spawnSync|exec\(|spawn\()")
        .expect("shell-out pattern is valid")
});

/// Scratch directory for generated code, inside the output directory.
pub fn scratch_dir_for(output_dir: &Path) -> PathBuf {
    output_dir.join(".maestro-scratch")
}

/// Combined safety layer for generated code: checks commands and source text
/// against the blocklist, confines writes to the scratch directory, and
/// delegates allowed commands to the shell executor with a timeout.
///
/// This is the single entry point for all command execution. No code should
/// call [`execute_shell`] directly -- always go through `SafetyLayer::execute`.
pub struct SafetyLayer {
    command_filter: CommandFilter,
    workspace_guard: WorkspaceGuard,
    timeout_secs: u64,
    security_log_path: PathBuf,
}

impl SafetyLayer {
    /// Build a SafetyLayer from the resolved application configuration.
    ///
    /// The workspace is the scratch directory under `config.output_dir`.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        Self::with_workspace(config, &scratch_dir_for(&config.output_dir))
    }

    pub fn with_workspace(config: &AppConfig, workspace: &Path) -> anyhow::Result<Self> {
        let command_filter = CommandFilter::new(&config.blocked_patterns)
            .map_err(|e| anyhow::anyhow!("Failed to compile command filter patterns: {}", e))?;

        let workspace_guard = WorkspaceGuard::new(workspace)
            .map_err(|e| anyhow::anyhow!("Failed to initialize scratch workspace: {}", e))?;

        Ok(Self {
            command_filter,
            workspace_guard,
            timeout_secs: config.execution_timeout_secs,
            security_log_path: config.security_log_path.clone(),
        })
    }

    /// Execute a shell command through the safety pipeline.
    ///
    /// 1. Check command against the blocklist.
    /// 2. If blocked: log to security file, return an [`ExecResult`] with the
    ///    blocked JSON in `stderr` and `exit_code` 126 ("cannot execute").
    /// 3. If allowed: delegate to [`execute_shell`] in the workspace with timeout.
    pub async fn execute(&self, command: &str) -> anyhow::Result<ExecResult> {
        if let Some(blocked) = self.command_filter.check(command) {
            self.log_blocked(&blocked);
            return Ok(Self::blocked_result(&blocked));
        }

        execute_shell(command, self.workspace_guard.canonical_root(), self.timeout_secs).await
    }

    /// Screen the lines of generated source that shell out (`os.system`,
    /// `subprocess`, `child_process`, ...) with the same blocklist. Other
    /// lines are not checked: `server.shutdown()` is ordinary code.
    pub fn check_source(&self, source: &str) -> Result<(), GuardrailError> {
        let blocked = source
            .lines()
            .filter(|line| SHELL_OUT.is_match(line))
            .find_map(|line| self.command_filter.check(line.trim()));
        match blocked {
            Some(blocked) => {
                self.log_blocked(&blocked);
                Err(GuardrailError::CommandBlocked {
                    command: blocked.command,
                    reason: blocked.reason,
                })
            }
            None => Ok(()),
        }
    }

    /// Write `contents` to `name` inside the workspace. `name` must be a
    /// single plain file name.
    pub fn write_file(&self, name: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let root = self.workspace_guard.canonical_root();
        let path = root.join(name);
        let allowed = is_plain_component(name)
            && matches!(self.workspace_guard.is_write_allowed(&path), Ok(true));
        if !allowed {
            return Err(GuardrailError::WriteOutsideRoot {
                path,
                root: root.to_path_buf(),
            }
            .into());
        }
        std::fs::write(&path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
        Ok(path)
    }

    /// Get the canonical workspace root path.
    pub fn workspace_root(&self) -> &Path {
        self.workspace_guard.canonical_root()
    }

    fn blocked_result(blocked: &BlockedCommand) -> ExecResult {
        ExecResult {
            stdout: String::new(),
            stderr: blocked.to_json(),
            exit_code: Some(126),
            timed_out: false,
        }
    }

    /// Append a JSON line to the security log for a blocked command.
    ///
    /// If the log file cannot be written, a warning is logged via tracing but
    /// the check itself is not affected.
    fn log_blocked(&self, blocked: &BlockedCommand) {
        tracing::warn!(reason = %blocked.reason, "Blocked generated command");

        let entry = serde_json::json!({
            "timestamp": now_iso(),
            "blocked": true,
            "reason": blocked.reason,
            "command": blocked.command,
        });

        if let Some(parent) = self.security_log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.security_log_path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{entry}") {
                    tracing::warn!(
                        "Failed to write to security log at {}: {}",
                        self.security_log_path.display(),
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open security log at {}: {}",
                    self.security_log_path.display(),
                    e
                );
            }
        }
    }
}
