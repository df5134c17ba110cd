//! Security module for apiforge — filesystem sandboxing and command allowlists.
//!
//! Provides:
//! - **Path resolution**: every tool path is resolved under one sandbox root
//! - **Command allowlists**: which test commands may run

pub mod allowlist;
pub mod path;

pub use allowlist::CommandAllowlist;
pub use path::{PathValidationError, SandboxRoot};
