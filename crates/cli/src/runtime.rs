//! Builds the runtime pieces shared by the commands from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use apiforge_config::{AppConfig, EmbedderKind, TestRunnerKind};
use apiforge_core::memory::Embedder;
use apiforge_core::provider::Provider;
use apiforge_memory::{ProviderEmbedder, TokenHashEmbedder, VectorStore};
use apiforge_providers::openai_compat::OpenAiCompatProvider;
use apiforge_security::CommandAllowlist;
use apiforge_tools::{SandboxWorkspace, ShellRunner, TestRunner};

/// The completion service client.
pub fn provider(config: &AppConfig) -> anyhow::Result<Arc<dyn Provider>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    APIFORGE_API_KEY=...   (generic)");
        eprintln!("    NVIDIA_API_KEY=...     (NVIDIA NIM)");
        eprintln!("    OPENAI_API_KEY=...     (OpenAI-compatible)");
        eprintln!();
        eprintln!("  Or set `api_key` in apiforge.toml.");
        eprintln!();
    }
    let provider = OpenAiCompatProvider::from_config(config)
        .context("Failed to build the completion service client")?;
    Ok(Arc::new(provider))
}

/// The embedder chosen by `memory.embedder`.
pub fn embedder(config: &AppConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(match config.memory.embedder {
        EmbedderKind::TokenHash => Arc::new(TokenHashEmbedder::new(config.memory.vector_dimension())),
        EmbedderKind::Provider => Arc::new(ProviderEmbedder::new(
            provider(config)?,
            config.memory.embedding_model.clone(),
            config.memory.vector_dimension(),
        )),
    })
}

/// Open the persistent similarity memory.
pub fn memory(config: &AppConfig) -> anyhow::Result<Arc<VectorStore>> {
    let store = VectorStore::open(
        &config.memory.index_path,
        &config.memory.metadata_path,
        embedder(config)?,
    )
    .with_context(|| {
        format!(
            "Failed to open memory at {}",
            config.memory.index_path.display()
        )
    })?;
    Ok(Arc::new(store))
}

/// The sandboxed workspace with the configured read cap and test runner.
pub fn workspace(config: &AppConfig) -> SandboxWorkspace {
    let root = &config.workspace.root;
    let runner = match config.tools.test_runner {
        TestRunnerKind::Stub => TestRunner::Stub,
        TestRunnerKind::Shell => TestRunner::Shell(ShellRunner::new(
            CommandAllowlist::new(config.tools.allowed_commands.clone()),
            root.clone(),
            Duration::from_secs(config.tools.test_timeout_secs),
        )),
    };
    SandboxWorkspace::new(root)
        .with_read_limit(config.workspace.read_limit_chars)
        .with_test_runner(runner)
}

pub fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).context("Failed to load config")
}
