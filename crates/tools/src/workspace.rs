//! The sandboxed filesystem the tools operate on.

use apiforge_core::error::ToolError;
use apiforge_core::tool::Workspace;
use apiforge_security::SandboxRoot;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::file_read::{DEFAULT_READ_LIMIT, read_capped};
use crate::file_write::append_code;
use crate::shell::TestRunner;

/// A [`Workspace`] rooted at one directory.
///
/// Every path is resolved through [`SandboxRoot`]; reads are capped,
/// writes only ever append.
#[derive(Debug, Clone)]
pub struct SandboxWorkspace {
    sandbox: SandboxRoot,
    read_limit_chars: usize,
    test_runner: TestRunner,
}

impl SandboxWorkspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            sandbox: SandboxRoot::new(root.as_ref()),
            read_limit_chars: DEFAULT_READ_LIMIT,
            test_runner: TestRunner::Stub,
        }
    }

    pub fn with_read_limit(mut self, chars: usize) -> Self {
        self.read_limit_chars = chars;
        self
    }

    pub fn with_test_runner(mut self, runner: TestRunner) -> Self {
        self.test_runner = runner;
        self
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    fn resolve(&self, tool: &str, path: &str) -> Result<std::path::PathBuf, ToolError> {
        self.sandbox.resolve(path).map_err(|e| {
            debug!(tool = %tool, path = %path, error = %e, "Path refused");
            ToolError::SandboxViolation(e.to_string())
        })
    }
}

#[async_trait]
impl Workspace for SandboxWorkspace {
    async fn read(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve("read_code", path)?;
        read_capped(&resolved, self.read_limit_chars).await
    }

    async fn append(&self, path: &str, code: &str) -> Result<String, ToolError> {
        let resolved = self.resolve("write_code", path)?;
        append_code(&resolved, code).await?;
        Ok(format!("SUCCESS: Appended code to {path}"))
    }

    async fn run_test(&self, command: &str) -> Result<String, ToolError> {
        self.test_runner.run(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::TEST_PASS;
    use tempfile::TempDir;

    #[tokio::test]
    async fn append_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let ws = SandboxWorkspace::new(dir.path());

        let msg = ws.append("generated.py", "def api(self):\n    pass").await.unwrap();
        assert_eq!(msg, "SUCCESS: Appended code to generated.py");

        let content = ws.read("generated.py").await.unwrap();
        assert!(content.contains("def api(self):\n    pass"));
        assert!(content.starts_with("\n\n"));
    }

    #[tokio::test]
    async fn read_limit_applies() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.py"), "x".repeat(500)).unwrap();
        let ws = SandboxWorkspace::new(dir.path()).with_read_limit(100);
        assert_eq!(ws.read("big.py").await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn escapes_are_sandbox_violations() {
        let dir = TempDir::new().unwrap();
        let ws = SandboxWorkspace::new(dir.path());
        assert!(matches!(ws.read("/etc/passwd").await, Err(ToolError::SandboxViolation(_))));
        assert!(matches!(
            ws.append("../outside.py", "x = 1").await,
            Err(ToolError::SandboxViolation(_))
        ));
        assert!(!dir.path().parent().unwrap().join("outside.py").exists());
    }

    #[tokio::test]
    async fn default_test_runner_is_stub() {
        let dir = TempDir::new().unwrap();
        let ws = SandboxWorkspace::new(dir.path());
        assert_eq!(ws.run_test("").await.unwrap(), TEST_PASS);
    }
}
