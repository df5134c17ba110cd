//! Configuration loading, validation, and management for apiforge.
//!
//! Loads configuration from `apiforge.toml` (or the file named by `--config`
//! / `APIFORGE_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use apiforge_core::agent::RejectionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "apiforge.toml";

/// Device groups hang off topologies, never off vports.
pub const STARTER_FORBIDDEN_PATTERNS: [&str; 2] = ["Vport.find().DeviceGroup", "Vport.DeviceGroup"];

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name, used in logs
    #[serde(default = "default_provider")]
    pub provider: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Output-token ceiling per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Turn budget per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Sandbox and output file
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Tool behavior
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Similarity memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Validation rules
    #[serde(default)]
    pub validation: ValidationConfig,

    /// System prompt
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Default request for a bare `apiforge` invocation
    #[serde(default)]
    pub run: RunConfig,
}

fn default_provider() -> String {
    "nvidia_nim".into()
}
fn default_api_base_url() -> String {
    "https://integrate.api.nvidia.com/v1".into()
}
fn default_model() -> String {
    "mistralai/devstral-2-123b-instruct-2512".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_iterations() -> u32 {
    6
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_base_url", &self.api_base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_iterations", &self.max_iterations)
            .field("workspace", &self.workspace)
            .field("tools", &self.tools)
            .field("memory", &self.memory)
            .field("validation", &self.validation)
            .field("prompt", &self.prompt)
            .field("run", &self.run)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Sandbox root; every tool path resolves under it
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// File (relative to root) that successful runs append to
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Maximum characters returned by a single read
    #[serde(default = "default_read_limit")]
    pub read_limit_chars: usize,

    /// Send every `write_code` call to `output_file`, ignoring its `file_path`
    #[serde(default = "default_true")]
    pub pin_writes_to_output: bool,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("apis")
}
fn default_output_file() -> String {
    "generated.py".into()
}
fn default_read_limit() -> usize {
    80_000
}

impl WorkspaceConfig {
    /// Human-readable location of the output artifact.
    pub fn output_location(&self) -> String {
        self.root.join(&self.output_file).display().to_string()
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            output_file: default_output_file(),
            read_limit_chars: default_read_limit(),
            pin_writes_to_output: true,
        }
    }
}

/// How `execute_test` runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestRunnerKind {
    /// Always reports a pass
    #[default]
    Stub,
    /// Runs allowlisted commands in the sandbox root
    Shell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Whether `execute_test` is declared to the model
    #[serde(default)]
    pub declare_test_tool: bool,

    #[serde(default)]
    pub test_runner: TestRunnerKind,

    /// Base commands the shell runner may execute
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,
}

fn default_allowed_commands() -> Vec<String> {
    vec!["pytest".into(), "python".into(), "python3".into()]
}
fn default_test_timeout() -> u64 {
    120
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            declare_test_tool: false,
            test_runner: TestRunnerKind::default(),
            allowed_commands: default_allowed_commands(),
            test_timeout_secs: default_test_timeout(),
        }
    }
}

/// Which embedder backs the similarity memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Deterministic local token hashing
    #[default]
    TokenHash,
    /// The completion service's embeddings endpoint
    Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default)]
    pub embedder: EmbedderKind,

    /// Model for the provider embedder
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Vector length. Optional for the token-hash embedder; required for the
    /// provider embedder, whose length depends on the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,

    /// Records recalled into the system prompt per run
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    /// Character cap on the recalled context block
    #[serde(default = "default_context_char_limit")]
    pub context_char_limit: usize,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/memory.index")
}
fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/memory_meta.json")
}
fn default_embedding_model() -> String {
    "nvidia/nv-embedqa-e5-v5".into()
}
/// Token-hash vector length when none is configured.
pub const DEFAULT_TOKEN_HASH_DIMENSION: usize = 384;

fn default_recall_limit() -> usize {
    3
}
fn default_context_char_limit() -> usize {
    8000
}

impl MemoryConfig {
    /// The vector length the embedder is built with.
    pub fn vector_dimension(&self) -> usize {
        self.dimension.unwrap_or(DEFAULT_TOKEN_HASH_DIMENSION)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            metadata_path: default_metadata_path(),
            embedder: EmbedderKind::default(),
            embedding_model: default_embedding_model(),
            dimension: None,
            recall_limit: default_recall_limit(),
            context_char_limit: default_context_char_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Substrings that must never appear in generated code, checked in order
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,

    /// What happens when the final answer is rejected
    #[serde(default)]
    pub final_answer_rejection: RejectionPolicy,

    /// Requests containing this marker are stored as human corrections
    #[serde(default = "default_correction_marker")]
    pub correction_marker: String,
}

fn default_correction_marker() -> String {
    "WHAT WAS WRONG:".into()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            forbidden_patterns: vec![],
            final_answer_rejection: RejectionPolicy::default(),
            correction_marker: default_correction_marker(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Inline system prompt (wins over the file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Path to a system prompt file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,
}

impl PromptConfig {
    /// The configured system prompt, if any. Reads the file when set.
    pub fn resolve(&self) -> Result<Option<String>, ConfigError> {
        if let Some(inline) = &self.system_prompt {
            return Ok(Some(inline.clone()));
        }
        let Some(path) = &self.system_prompt_file else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Request used when none is given on the command line
    #[serde(default = "default_request")]
    pub default_request: String,
}

fn default_request() -> String {
    "Create a new API that follows the object chaining, logging and naming \
     patterns of the existing module. Read the existing module first."
        .into()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_request: default_request(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Resolution order: `explicit` path, then `APIFORGE_CONFIG`, then
    /// `./apiforge.toml`. An explicitly named file must exist; the implicit
    /// one falls back to defaults.
    ///
    /// Environment overrides (highest priority):
    /// - `APIFORGE_API_KEY`, then `NVIDIA_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `APIFORGE_MODEL`
    /// - `APIFORGE_BASE_URL`
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var("APIFORGE_CONFIG").ok().map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) if !path.exists() => {
                return Err(ConfigError::ReadError {
                    path,
                    reason: "file not found".into(),
                });
            }
            Some(path) => Self::load_from(&path)?,
            None => Self::load_from(Path::new(DEFAULT_CONFIG_FILE))?,
        };

        if config.api_key.is_none() {
            config.api_key = std::env::var("APIFORGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("NVIDIA_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("APIFORGE_MODEL") {
            config.model = model;
        }

        if let Ok(url) = std::env::var("APIFORGE_BASE_URL") {
            config.api_base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".into(),
            ));
        }

        if self.workspace.output_file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "workspace.output_file must not be empty".into(),
            ));
        }

        if self.workspace.read_limit_chars == 0 {
            return Err(ConfigError::ValidationError(
                "workspace.read_limit_chars must be greater than 0".into(),
            ));
        }

        if self.memory.dimension == Some(0) {
            return Err(ConfigError::ValidationError(
                "memory.dimension must be greater than 0".into(),
            ));
        }

        if self.memory.embedder == EmbedderKind::Provider && self.memory.dimension.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "memory.dimension must be set to the output length of '{}' when memory.embedder = \"provider\"",
                self.memory.embedding_model
            )));
        }

        // An empty marker is contained in every request.
        if self.validation.correction_marker.is_empty() {
            return Err(ConfigError::ValidationError(
                "validation.correction_marker must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Defaults plus the IxNetwork forbidden patterns, written by `init`.
    pub fn starter() -> Self {
        let mut config = Self::default();
        config.validation.forbidden_patterns = STARTER_FORBIDDEN_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        config
    }

    /// The starter configuration as TOML (for `init`).
    pub fn starter_toml() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::starter())
            .map_err(|e| ConfigError::ValidationError(format!("Failed to render config: {e}")))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_base_url: default_api_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            workspace: WorkspaceConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
            validation: ValidationConfig::default(),
            prompt: PromptConfig::default(),
            run: RunConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.workspace.read_limit_chars, 80_000);
        assert_eq!(config.memory.recall_limit, 3);
        assert_eq!(config.validation.correction_marker, "WHAT WAS WRONG:");
        assert_eq!(config.validation.final_answer_rejection, RejectionPolicy::Fatal);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.workspace.output_file, config.workspace.output_file);
        assert_eq!(parsed.memory.index_path, config.memory.index_path);
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = AppConfig {
            max_iterations: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_correction_marker_rejected() {
        let mut config = AppConfig::default();
        config.validation.correction_marker.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/apiforge.toml")).unwrap();
        assert_eq!(config.provider, "nvidia_nim");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/apiforge.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
max_iterations = 4

[workspace]
root = "cafy_apis"
output_file = "ixia_generated.py"

[validation]
forbidden_patterns = ["Vport.find().DeviceGroup", "Vport.DeviceGroup"]
final_answer_rejection = "recover"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.workspace.root, PathBuf::from("cafy_apis"));
        assert_eq!(config.workspace.output_location(), "cafy_apis/ixia_generated.py");
        assert!(config.workspace.pin_writes_to_output);
        assert_eq!(config.validation.forbidden_patterns.len(), 2);
        assert_eq!(config.validation.final_answer_rejection, RejectionPolicy::Recover);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.memory.embedder, EmbedderKind::TokenHash);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "max_iterations = \"six\"").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("nvapi-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("nvapi-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn inline_prompt_wins_over_file() {
        let prompt = PromptConfig {
            system_prompt: Some("inline".into()),
            system_prompt_file: Some(PathBuf::from("/nonexistent/prompt.md")),
        };
        assert_eq!(prompt.resolve().unwrap().as_deref(), Some("inline"));
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let prompt = PromptConfig {
            system_prompt: None,
            system_prompt_file: Some(PathBuf::from("/nonexistent/prompt.md")),
        };
        assert!(prompt.resolve().is_err());
        assert!(PromptConfig::default().resolve().unwrap().is_none());
    }

    #[test]
    fn starter_toml_carries_forbidden_patterns() {
        let toml_str = AppConfig::starter_toml().unwrap();
        assert!(toml_str.contains("nvidia_nim"));
        assert!(toml_str.contains("WHAT WAS WRONG:"));
        assert!(toml_str.contains("Vport.find().DeviceGroup"));

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.validation.forbidden_patterns, STARTER_FORBIDDEN_PATTERNS);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn provider_embedder_requires_explicit_dimension() {
        let mut config = AppConfig::default();
        config.memory.embedder = EmbedderKind::Provider;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("memory.dimension"), "got: {err}");

        config.memory.dimension = Some(1024);
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.vector_dimension(), 1024);
    }

    #[test]
    fn token_hash_dimension_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.memory.dimension, None);
        assert_eq!(config.memory.vector_dimension(), DEFAULT_TOKEN_HASH_DIMENSION);

        let mut zero = AppConfig::default();
        zero.memory.dimension = Some(0);
        assert!(zero.validate().is_err());
    }
}
