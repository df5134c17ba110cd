//! LLM provider implementations for apiforge.
//!
//! Providers implement the `apiforge_core::Provider` trait. The completion
//! service is reached through its OpenAI-compatible endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
