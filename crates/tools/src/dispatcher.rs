//! Tool dispatcher — executes parsed tool requests against a workspace.
//!
//! Every typed [`ToolError`] is converted into a failed [`ToolResult`] here,
//! so nothing a tool does can abort the agent loop. Write gating (ordering,
//! validation, output pinning) is the loop's job, not the dispatcher's.

use apiforge_core::provider::ToolDefinition;
use apiforge_core::tool::{ToolFailure, ToolKind, ToolRequest, ToolResult, Workspace};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ToolDispatcher {
    workspace: Arc<dyn Workspace>,
}

impl ToolDispatcher {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self { workspace }
    }

    /// Tool declarations sent to the model. `execute_test` is only declared
    /// when asked for; it stays dispatchable either way.
    pub fn definitions(&self, include_test: bool) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .iter()
            .filter(|k| include_test || **k != ToolKind::Test)
            .map(ToolKind::to_definition)
            .collect()
    }

    /// Execute one request and return its result.
    pub async fn dispatch(&self, call_id: &str, request: &ToolRequest) -> ToolResult {
        match request {
            ToolRequest::Read(args) => self.read(call_id, &args.file_path).await,
            ToolRequest::Write(args) => self.append(call_id, &args.file_path, &args.new_code).await,
            ToolRequest::Test(args) => self.run_test(call_id, &args.command).await,
            ToolRequest::Malformed { tool, reason } => Self::malformed(call_id, *tool, reason),
            ToolRequest::Unknown { name } => Self::unknown(call_id, name),
        }
    }

    pub async fn read(&self, call_id: &str, path: &str) -> ToolResult {
        let start = Instant::now();
        let result = self.workspace.read(path).await;
        Self::finish(call_id, ToolKind::Read, start, result)
    }

    pub async fn append(&self, call_id: &str, path: &str, code: &str) -> ToolResult {
        let start = Instant::now();
        let result = self.workspace.append(path, code).await;
        Self::finish(call_id, ToolKind::Write, start, result)
    }

    pub async fn run_test(&self, call_id: &str, command: &str) -> ToolResult {
        let start = Instant::now();
        let result = self.workspace.run_test(command).await;
        Self::finish(call_id, ToolKind::Test, start, result)
    }

    pub fn unknown(call_id: &str, name: &str) -> ToolResult {
        warn!(tool = %name, "Model called an unknown tool");
        ToolResult::failed(call_id, ToolFailure::UnknownTool(name.to_string()))
    }

    pub fn malformed(call_id: &str, tool: ToolKind, reason: &str) -> ToolResult {
        warn!(tool = %tool, reason = %reason, "Malformed tool arguments");
        ToolResult::failed(
            call_id,
            ToolFailure::InvalidArguments {
                tool: tool.name().to_string(),
                reason: reason.to_string(),
            },
        )
    }

    fn finish(
        call_id: &str,
        tool: ToolKind,
        start: Instant,
        result: Result<String, apiforge_core::error::ToolError>,
    ) -> ToolResult {
        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(output) => {
                debug!(tool = %tool, duration_ms, "Tool succeeded");
                ToolResult::ok(call_id, output)
            }
            Err(e) => {
                warn!(tool = %tool, duration_ms, error = %e, "Tool failed");
                ToolResult::failed(
                    call_id,
                    ToolFailure::Execution {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }
}
