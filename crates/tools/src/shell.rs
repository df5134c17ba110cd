//! Test runners behind `execute_test`.
//!
//! The stub always passes. The shell runner executes allowlisted commands in
//! the workspace root with a timeout. Commands are split on whitespace and
//! executed directly, never through a shell.

use apiforge_core::error::ToolError;
use apiforge_security::CommandAllowlist;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Reported when a test passes.
pub const TEST_PASS: &str = "TEST_RESULT: PASS";

/// Reported when a test fails.
pub const TEST_FAIL: &str = "TEST_RESULT: FAIL";

#[derive(Debug, Clone, Default)]
pub enum TestRunner {
    /// Reports a pass without running anything
    #[default]
    Stub,
    Shell(ShellRunner),
}

impl TestRunner {
    pub async fn run(&self, command: &str) -> Result<String, ToolError> {
        match self {
            TestRunner::Stub => Ok(TEST_PASS.to_string()),
            TestRunner::Shell(runner) => runner.run(command).await,
        }
    }
}

/// Execute test commands with an allowlist, a working directory and a timeout.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    allowlist: CommandAllowlist,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(allowlist: CommandAllowlist, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            allowlist,
            working_dir: working_dir.into(),
            timeout,
        }
    }

    pub async fn run(&self, command: &str) -> Result<String, ToolError> {
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "execute_test needs a command".into(),
            ));
        }

        if !self.allowlist.is_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "execute_test".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    CommandAllowlist::base_command(command)
                ),
            });
        }

        debug!(command = %command, cwd = %self.working_dir.display(), "Running test command");

        let mut argv = command.split_whitespace();
        let program = argv.next().unwrap_or_default();
        let mut cmd = Command::new(program);
        cmd.args(argv).current_dir(&self.working_dir).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "execute_test".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "execute_test".into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let report = if output.status.success() {
            format!("{TEST_PASS}\n{stdout}\n{stderr}")
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Test command failed");
            format!("{TEST_FAIL}\n[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(report.trim().to_string())
    }
}
