//! Tool types — the fixed set of operations the model may request.
//!
//! The model declares tool calls as a name plus a JSON argument string.
//! [`ToolRequest::parse`] turns that into a tagged variant with typed
//! arguments; anything outside the known set lands in an explicit default arm.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// The tools the agent knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Read a source file under the sandbox root.
    Read,
    /// Append generated code to a source file.
    Write,
    /// Run a test command.
    Test,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Read, ToolKind::Write, ToolKind::Test];

    /// The name the model uses to call this tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Read => "read_code",
            ToolKind::Write => "write_code",
            ToolKind::Test => "execute_test",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::Read => "Read the contents of an existing source file in the API directory.",
            ToolKind::Write => "Append new code to a source file in the API directory. Existing code is never overwritten.",
            ToolKind::Test => "Run a test command against the generated code and report pass or fail.",
        }
    }

    /// JSON Schema describing this tool's parameters.
    pub fn parameters_schema(&self) -> serde_json::Value {
        match self {
            ToolKind::Read => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string" }
                },
                "required": ["file_path"]
            }),
            ToolKind::Write => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string" },
                    "new_code": { "type": "string" }
                },
                "required": ["file_path", "new_code"]
            }),
            ToolKind::Test => serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" }
                },
                "required": ["command"]
            }),
        }
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteArgs {
    pub file_path: String,
    pub new_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestArgs {
    #[serde(default)]
    pub command: String,
}

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    Read(ReadArgs),
    Write(WriteArgs),
    Test(TestArgs),
    /// A known tool whose arguments did not match its schema.
    Malformed { tool: ToolKind, reason: String },
    /// A tool name outside the known set.
    Unknown { name: String },
}

impl ToolRequest {
    /// Parse a declared tool call into a typed request.
    pub fn parse(call: &MessageToolCall) -> Self {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            return ToolRequest::Unknown { name: call.name.clone() };
        };

        // Some models send an empty string instead of "{}" for no-arg calls.
        let raw = if call.arguments.trim().is_empty() { "{}" } else { call.arguments.as_str() };

        let parsed = match kind {
            ToolKind::Read => serde_json::from_str(raw).map(ToolRequest::Read),
            ToolKind::Write => serde_json::from_str(raw).map(ToolRequest::Write),
            ToolKind::Test => serde_json::from_str(raw).map(ToolRequest::Test),
        };

        parsed.unwrap_or_else(|e| ToolRequest::Malformed {
            tool: kind,
            reason: e.to_string(),
        })
    }
}

/// A locally-recovered tool failure. Its display text is what the model sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolFailure {
    #[error("VALIDATION_ERROR: forbidden pattern detected: {pattern}")]
    Validation { pattern: String },

    #[error("VALIDATION_ERROR: write attempted before read_code")]
    Ordering,

    #[error("ERROR: Unknown tool {0}")]
    UnknownTool(String),

    #[error("ERROR: invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("ERROR: {reason}")]
    Execution { reason: String },
}

/// The result of one tool call, correlated by call id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The text appended to the conversation
    pub output: String,

    /// Classified failure, when `success` is false
    pub failure: Option<ToolFailure>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
            failure: None,
        }
    }

    pub fn failed(call_id: impl Into<String>, failure: ToolFailure) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: failure.to_string(),
            failure: Some(failure),
        }
    }
}

/// The side-effecting operations behind the tools.
///
/// Implementations return typed errors; the dispatcher converts them into
/// error-string results before they reach the agent loop.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Read a file, capped to the implementation's character limit.
    async fn read(&self, path: &str) -> std::result::Result<String, ToolError>;

    /// Append code to a file, creating it and its parent directories if needed.
    async fn append(&self, path: &str, code: &str) -> std::result::Result<String, ToolError>;

    /// Run a test command and report the outcome.
    async fn run_test(&self, command: &str) -> std::result::Result<String, ToolError>;
}
