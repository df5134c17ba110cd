//! # apiforge core
//!
//! Domain types, traits, and error definitions for the apiforge
//! code-generation agent. This crate defines the model every other crate
//! implements against: conversations, typed tool requests, the completion
//! service, similarity memory, embedders and the validator.
//!
//! Each external collaborator is a trait here so it can be swapped by
//! configuration or replaced by a fake in tests.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod validator;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, Result};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{ToolFailure, ToolKind, ToolRequest, ToolResult, Workspace};
pub use memory::{Embedder, MemoryRecord, RecordKind, RecordMetadata, SimilarityMemory};
pub use validator::{PatternValidator, ValidationOutcome, Validator};
pub use agent::{AgentRunResult, RejectionPolicy, RejectionSite};
pub use event::{DomainEvent, EventBus};
