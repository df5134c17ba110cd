//! The agent loop for apiforge.
//!
//! One run follows a **Recall → Generate → Act → Validate → Remember** cycle:
//!
//! 1. **Recall** similar past generations and corrections from memory
//! 2. **Send** the system prompt, recalled context and request to the LLM
//! 3. **If tool calls**: gate writes behind a prior read and the validator,
//!    execute the tools, append results, loop back to step 2
//! 4. **If text response**: validate it, append it to the output file and
//!    store it as a new memory
//!
//! The loop ends on an accepted final answer, a fatal error, or when the
//! iteration budget runs out.

pub mod loop_runner;
pub mod prompts;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{AgentLoop, RunState};
pub use prompts::{CONTEXT_HEADER, DEFAULT_SYSTEM_PROMPT, system_message};
