//! Agent run outcomes and validation policy types.

use serde::{Deserialize, Serialize};

/// Terminal, non-fatal outcome of one agent run.
///
/// Fatal outcomes (empty answer, rejected final answer under the fatal
/// policy) are returned as `Err(Error::Agent(..))` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentRunResult {
    /// A final answer was validated and appended to `location`.
    Success { location: String },

    /// The iteration budget ran out before a final answer.
    ConvergenceFailure { iterations: u32 },
}

impl AgentRunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentRunResult::Success { .. })
    }
}

impl std::fmt::Display for AgentRunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRunResult::Success { location } => write!(f, "SUCCESS: Code written to {location}"),
            AgentRunResult::ConvergenceFailure { .. } => f.write_str("Agent did not converge"),
        }
    }
}

/// Where a validation rejection happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionSite {
    /// Inside a `write_code` tool call.
    ToolCall,
    /// In the model's final, tool-free answer.
    FinalAnswer,
}

/// What to do when the final answer is rejected.
///
/// Tool-call rejections are always recovered; this only governs the final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Abort the run with a validation error.
    #[default]
    Fatal,
    /// Feed the violation back to the model and keep looping.
    Recover,
}
