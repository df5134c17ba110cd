//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::Instant;

use apiforge_config::AppConfig;
use apiforge_core::agent::{AgentRunResult, RejectionPolicy, RejectionSite};
use apiforge_core::error::{AgentError, ToolError};
use apiforge_core::event::{DomainEvent, EventBus};
use apiforge_core::memory::{RecordMetadata, SimilarityMemory};
use apiforge_core::message::{Conversation, Message, MessageToolCall};
use apiforge_core::provider::{Provider, ProviderRequest, ToolDefinition};
use apiforge_core::tool::{ToolFailure, ToolRequest, ToolResult};
use apiforge_core::validator::{ValidationOutcome, Validator};
use apiforge_memory::rag::{
    DEFAULT_CONTEXT_CHAR_LIMIT, DEFAULT_RECALL_LIMIT, generation_text, rejection_text,
    retrieve_context,
};
use apiforge_tools::ToolDispatcher;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::prompts::{DEFAULT_SYSTEM_PROMPT, system_message};

/// Correlation id used for the final-answer write, which has no tool call.
const FINAL_ANSWER_CALL_ID: &str = "final_answer";

/// Mutable state of one run.
#[derive(Debug)]
pub struct RunState {
    pub conversation: Conversation,
    pub iteration: u32,
    pub read_occurred: bool,
    pub write_occurred: bool,
}

impl RunState {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            iteration: 0,
            read_occurred: false,
            write_occurred: false,
        }
    }

    fn run_id(&self) -> String {
        self.conversation.id.to_string()
    }
}

/// The core agent loop that orchestrates LLM calls, validation and tool
/// execution for one code-generation request at a time.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Output-token ceiling per response
    max_tokens: u32,

    /// Turn budget per run
    max_iterations: u32,

    /// Tool dispatcher over the sandboxed workspace
    tools: Arc<ToolDispatcher>,

    /// Rejects forbidden patterns in generated code
    validator: Arc<dyn Validator>,

    /// Recall source and sink for generations and corrections
    memory: Arc<dyn SimilarityMemory>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    system_prompt: String,

    /// Workspace-relative file that accepted code is appended to
    output_file: String,

    /// How the output location is reported in the success message
    output_label: String,

    /// Requests containing this marker are stored as human corrections
    correction_marker: String,

    recall_limit: usize,
    context_char_limit: usize,

    /// What happens when the final answer fails validation
    rejection_policy: RejectionPolicy,

    /// Send every `write_code` to `output_file`
    pin_writes: bool,

    /// Declare `execute_test` to the model
    declare_test_tool: bool,
}

impl AgentLoop {
    /// Create a new agent loop with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolDispatcher>,
        validator: Arc<dyn Validator>,
        memory: Arc<dyn SimilarityMemory>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let output_file = "generated.py".to_string();
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
            max_iterations: 6,
            tools,
            validator,
            memory,
            event_bus,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            output_label: output_file.clone(),
            output_file,
            correction_marker: "WHAT WAS WRONG:".into(),
            recall_limit: DEFAULT_RECALL_LIMIT,
            context_char_limit: DEFAULT_CONTEXT_CHAR_LIMIT,
            rejection_policy: RejectionPolicy::default(),
            pin_writes: true,
            declare_test_tool: false,
        }
    }

    /// Apply every loop setting from the configuration.
    pub fn configured(self, config: &AppConfig) -> Self {
        self.with_max_iterations(config.max_iterations)
            .with_max_tokens(config.max_tokens)
            .with_output_file(config.workspace.output_file.clone())
            .with_output_label(config.workspace.output_location())
            .with_correction_marker(config.validation.correction_marker.clone())
            .with_recall_limit(config.memory.recall_limit)
            .with_context_char_limit(config.memory.context_char_limit)
            .with_rejection_policy(config.validation.final_answer_rejection)
            .with_pinned_writes(config.workspace.pin_writes_to_output)
            .with_test_tool(config.tools.declare_test_tool)
    }

    /// Set the maximum number of turns.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the output file; the reported location follows it unless
    /// [`Self::with_output_label`] is called afterwards.
    pub fn with_output_file(mut self, file: impl Into<String>) -> Self {
        self.output_file = file.into();
        self.output_label = self.output_file.clone();
        self
    }

    pub fn with_output_label(mut self, label: impl Into<String>) -> Self {
        self.output_label = label.into();
        self
    }

    pub fn with_correction_marker(mut self, marker: impl Into<String>) -> Self {
        self.correction_marker = marker.into();
        self
    }

    /// Set the maximum number of memories to recall per run.
    pub fn with_recall_limit(mut self, limit: usize) -> Self {
        self.recall_limit = limit;
        self
    }

    pub fn with_context_char_limit(mut self, chars: usize) -> Self {
        self.context_char_limit = chars;
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_pinned_writes(mut self, pinned: bool) -> Self {
        self.pin_writes = pinned;
        self
    }

    pub fn with_test_tool(mut self, declared: bool) -> Self {
        self.declare_test_tool = declared;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Tool declarations sent on every turn.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions(self.declare_test_tool)
    }

    /// Run one request to completion.
    ///
    /// Returns `Success` or `ConvergenceFailure`. An empty final answer, a
    /// final answer rejected under the fatal policy, and provider or memory
    /// failures are returned as errors.
    pub async fn run(&self, request: &str) -> Result<AgentRunResult, apiforge_core::Error> {
        // Recall before the conversation exists so the system message is final.
        let recalled = retrieve_context(
            self.memory.as_ref(),
            request,
            self.recall_limit,
            self.context_char_limit,
        )
        .await?;

        let conversation =
            Conversation::seeded(system_message(&self.system_prompt, &recalled.text), request);
        let mut state = RunState::new(conversation);
        let run_id = state.run_id();

        info!(
            run_id = %run_id,
            recalled = recalled.records,
            max_iterations = self.max_iterations,
            "Starting agent run"
        );
        self.event_bus.publish(DomainEvent::RunStarted {
            run_id: run_id.clone(),
            request_preview: request.chars().take(120).collect(),
            recalled: recalled.records,
            timestamp: Utc::now(),
        });

        let tool_definitions = self.tool_definitions();

        for iteration in 1..=self.max_iterations {
            state.iteration = iteration;
            debug!(run_id = %run_id, iteration, "Agent loop iteration");

            let response = self
                .provider
                .complete(ProviderRequest {
                    model: self.model.clone(),
                    messages: state.conversation.messages.clone(),
                    temperature: 0.0,
                    max_tokens: Some(self.max_tokens),
                    tools: tool_definitions.clone(),
                })
                .await?;

            self.event_bus.publish(DomainEvent::ModelResponded {
                run_id: run_id.clone(),
                iteration,
                tool_calls: response.message.tool_calls.len(),
                tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
                timestamp: Utc::now(),
            });

            if response.message.has_tool_calls() {
                let calls = response.message.tool_calls.clone();
                debug!(run_id = %run_id, tool_count = calls.len(), "Executing tool calls");
                state.conversation.push(response.message);

                for call in &calls {
                    let start = Instant::now();
                    let result = self.handle_tool_call(&mut state, request, call).await?;
                    self.event_bus.publish(DomainEvent::ToolDispatched {
                        run_id: run_id.clone(),
                        tool_name: call.name.clone(),
                        success: result.success,
                        duration_ms: start.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                    state
                        .conversation
                        .push(Message::tool_result(&result.call_id, &result.output));
                }
                continue;
            }

            if let Some(result) = self
                .handle_final_answer(&mut state, request, response.message)
                .await?
            {
                info!(run_id = %run_id, iteration, "Agent run succeeded");
                self.publish_finished(&state, true);
                return Ok(result);
            }
        }

        warn!(
            run_id = %run_id,
            iterations = self.max_iterations,
            "Iteration budget exhausted without a final answer"
        );
        self.publish_finished(&state, false);
        Ok(AgentRunResult::ConvergenceFailure {
            iterations: self.max_iterations,
        })
    }

    /// Handle one declared tool call and produce the result the model sees.
    async fn handle_tool_call(
        &self,
        state: &mut RunState,
        request: &str,
        call: &MessageToolCall,
    ) -> Result<ToolResult, apiforge_core::Error> {
        let parsed = ToolRequest::parse(call);

        let result = match &parsed {
            ToolRequest::Read(args) => {
                // Set even when the read fails.
                state.read_occurred = true;
                self.tools.read(&call.id, &args.file_path).await
            }
            ToolRequest::Write(_) if !state.read_occurred => {
                warn!(run_id = %state.run_id(), "Write attempted before any read");
                ToolResult::failed(&call.id, ToolFailure::Ordering)
            }
            ToolRequest::Write(args) => match self.validator.validate(&args.new_code) {
                ValidationOutcome::Reject { pattern } => {
                    self.handle_rejection(state, request, &args.new_code, &pattern, RejectionSite::ToolCall)
                        .await?;
                    ToolResult::failed(&call.id, ToolFailure::Validation { pattern })
                }
                ValidationOutcome::Accept => {
                    let target = if self.pin_writes {
                        self.output_file.as_str()
                    } else {
                        args.file_path.as_str()
                    };
                    let result = self.tools.append(&call.id, target, &args.new_code).await;
                    if result.success {
                        state.write_occurred = true;
                    }
                    result
                }
            },
            ToolRequest::Test(_) | ToolRequest::Unknown { .. } | ToolRequest::Malformed { .. } => {
                self.tools.dispatch(&call.id, &parsed).await
            }
        };

        Ok(result)
    }

    /// Handle a tool-free answer. `Ok(None)` means the loop should continue.
    async fn handle_final_answer(
        &self,
        state: &mut RunState,
        request: &str,
        message: Message,
    ) -> Result<Option<AgentRunResult>, apiforge_core::Error> {
        let content = message.content.clone();
        let run_id = state.run_id();

        if content.trim().is_empty() {
            warn!(run_id = %run_id, "Model returned an empty final answer");
            self.publish_finished(state, false);
            return Err(AgentError::EmptyResponse.into());
        }

        if let ValidationOutcome::Reject { pattern } = self.validator.validate(&content) {
            // Returns an error under the fatal policy.
            self.handle_rejection(state, request, &content, &pattern, RejectionSite::FinalAnswer)
                .await?;
            state.conversation.push(message);
            state
                .conversation
                .push(Message::user(ToolFailure::Validation { pattern }.to_string()));
            return Ok(None);
        }

        let written = self
            .tools
            .append(FINAL_ANSWER_CALL_ID, &self.output_file, &content)
            .await;
        if !written.success {
            self.publish_finished(state, false);
            return Err(ToolError::ExecutionFailed {
                tool_name: "write_code".into(),
                reason: written.output,
            }
            .into());
        }
        state.write_occurred = true;
        state.conversation.push(message);

        let metadata = if request.contains(self.correction_marker.as_str()) {
            RecordMetadata::human_correction()
        } else {
            RecordMetadata::validated_generation()
        };
        self.remember(&run_id, &generation_text(request, &content), metadata)
            .await?;

        Ok(Some(AgentRunResult::Success {
            location: self.output_label.clone(),
        }))
    }

    /// Shared handling for a rejected candidate at either site.
    ///
    /// Always stores a correction record and publishes the rejection. Returns
    /// an error only for a final answer under the fatal policy.
    async fn handle_rejection(
        &self,
        state: &RunState,
        request: &str,
        code: &str,
        pattern: &str,
        site: RejectionSite,
    ) -> Result<(), apiforge_core::Error> {
        let run_id = state.run_id();
        let violation = ToolFailure::Validation {
            pattern: pattern.to_string(),
        }
        .to_string();

        warn!(run_id = %run_id, ?site, pattern = %pattern, "Validation rejected generated code");

        self.remember(
            &run_id,
            &rejection_text(request, code, &violation),
            RecordMetadata::rejected_generation(),
        )
        .await?;

        self.event_bus.publish(DomainEvent::ValidationRejected {
            run_id: run_id.clone(),
            site,
            pattern: pattern.to_string(),
            timestamp: Utc::now(),
        });

        match (site, self.rejection_policy) {
            (RejectionSite::ToolCall, _) | (RejectionSite::FinalAnswer, RejectionPolicy::Recover) => Ok(()),
            (RejectionSite::FinalAnswer, RejectionPolicy::Fatal) => {
                self.publish_finished(state, false);
                Err(AgentError::Validation {
                    pattern: pattern.to_string(),
                }
                .into())
            }
        }
    }

    /// Store a record tagged with the run id.
    async fn remember(
        &self,
        run_id: &str,
        text: &str,
        metadata: RecordMetadata,
    ) -> Result<(), apiforge_core::Error> {
        let kind = metadata.kind;
        let record_id = self.memory.store(text, metadata.with_run_id(run_id)).await?;
        debug!(run_id = %run_id, record_id = %record_id, ?kind, "Stored memory record");
        self.event_bus.publish(DomainEvent::MemoryStored {
            run_id: run_id.to_string(),
            record_id,
            kind,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn publish_finished(&self, state: &RunState, success: bool) {
        self.event_bus.publish(DomainEvent::RunFinished {
            run_id: state.run_id(),
            success,
            iterations: state.iteration,
            timestamp: Utc::now(),
        });
    }
}
