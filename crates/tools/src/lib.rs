//! Tool implementations for apiforge.
//!
//! The model can read existing source, append generated code, and run a test
//! command. All of it happens inside one sandboxed workspace directory.

pub mod dispatcher;
pub mod file_read;
pub mod file_write;
pub mod shell;
pub mod workspace;

pub use dispatcher::ToolDispatcher;
pub use shell::{ShellRunner, TestRunner};
pub use workspace::SandboxWorkspace;
