//! End-to-end integration tests for apiforge.
//!
//! These tests exercise the full pipeline from a request to the appended
//! output file, with persistent similarity memory, the sandboxed workspace
//! and the pattern validator wired together the way the CLI wires them.

use std::path::Path;
use std::sync::{Arc, Mutex};

use apiforge_agent::{AgentLoop, CONTEXT_HEADER};
use apiforge_config::AppConfig;
use apiforge_core::agent::AgentRunResult;
use apiforge_core::error::{AgentError, Error, ProviderError};
use apiforge_core::event::EventBus;
use apiforge_core::memory::{Confidence, Embedder, Provenance, RecordKind, SimilarityMemory};
use apiforge_core::message::{Message, MessageToolCall, Role};
use apiforge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use apiforge_core::validator::PatternValidator;
use apiforge_memory::{TokenHashEmbedder, VectorStore, ingest_files, store_correction};
use apiforge_security::SandboxRoot;
use apiforge_tools::{SandboxWorkspace, ToolDispatcher};
use tempfile::TempDir;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn system_prompt(&self, call: usize) -> String {
        self.requests.lock().unwrap()[call].messages[0].content.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();
        if count >= responses.len() {
            panic!("ScriptedProvider exhausted: call #{count}, have {}", responses.len());
        }
        requests.push(request);
        Ok(responses[count].clone())
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: Some("stop".into()),
        usage: usage(),
        model: "e2e-model".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = tool_calls;
    ProviderResponse {
        message,
        finish_reason: Some("tool_calls".into()),
        usage: usage(),
        model: "e2e-model".into(),
    }
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

// ── Fixture ──────────────────────────────────────────────────────────────

const REFERENCE: &str = r#"class IxiaApis:
    def configure_multicast(self):
        """Configure a multicast topology."""
        topology = self.ixNetwork.Topology.add()
        return topology
"#;

const FORBIDDEN: [&str; 2] = ["Vport.find().DeviceGroup", "Vport.DeviceGroup"];

/// A temp directory holding the workspace root and the memory files.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("apis")).unwrap();
        std::fs::write(dir.path().join("apis/ixia.py"), REFERENCE).unwrap();
        Self { dir }
    }

    fn root(&self) -> std::path::PathBuf {
        self.dir.path().join("apis")
    }

    fn open_memory(&self) -> Arc<VectorStore> {
        let embedder: Arc<dyn Embedder> = Arc::new(TokenHashEmbedder::default());
        Arc::new(
            VectorStore::open(
                self.dir.path().join("data/memory.index"),
                self.dir.path().join("data/memory_meta.json"),
                embedder,
            )
            .unwrap(),
        )
    }

    fn agent(&self, provider: Arc<ScriptedProvider>, memory: Arc<VectorStore>) -> AgentLoop {
        let tools = Arc::new(ToolDispatcher::new(Arc::new(SandboxWorkspace::new(self.root()))));
        AgentLoop::new(
            provider,
            "e2e-model",
            tools,
            Arc::new(PatternValidator::new(FORBIDDEN)),
            memory,
            Arc::new(EventBus::default()),
        )
        .with_output_file("ixia_generated.py")
    }

    fn output(&self) -> Option<String> {
        std::fs::read_to_string(self.root().join("ixia_generated.py")).ok()
    }
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("apiforge.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_read_reject_recover_and_persist() {
    let fx = Fixture::new();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![tool_call("r1", "read_code", serde_json::json!({"file_path": "ixia.py"}))]),
        tool_response(vec![tool_call(
            "w1",
            "write_code",
            serde_json::json!({
                "file_path": "ixia_generated.py",
                "new_code": "dg = self.ixNetwork.Vport.find().DeviceGroup.add()"
            }),
        )]),
        text_response(
            "def configure_device_group(self):\n    \"\"\"Add a device group.\"\"\"\n    return self.ixNetwork.Topology.add().DeviceGroup.add()",
        ),
    ]));

    let memory = fx.open_memory();
    let result = fx
        .agent(provider.clone(), memory.clone())
        .run("create a device group api")
        .await
        .unwrap();

    assert_eq!(result, AgentRunResult::Success { location: "ixia_generated.py".into() });
    assert_eq!(provider.calls(), 3);

    let output = fx.output().unwrap();
    assert!(output.starts_with("\n\ndef configure_device_group"));
    assert!(!output.contains("Vport"));

    // Reopen from disk: both records survived.
    drop(memory);
    let reopened = fx.open_memory();
    let records = reopened.records().await.unwrap();
    let kinds: Vec<RecordKind> = records.iter().map(|r| r.metadata.kind).collect();
    assert_eq!(kinds, vec![RecordKind::Correction, RecordKind::ValidatedGeneration]);
    assert_eq!(records[0].metadata.run_id, records[1].metadata.run_id);
}

#[tokio::test]
async fn e2e_second_run_recalls_first() {
    let fx = Fixture::new();

    let first = Arc::new(ScriptedProvider::new(vec![text_response(
        "def configure_bgp_peer(self):\n    return self.ixNetwork.Topology.add()",
    )]));
    fx.agent(first, fx.open_memory())
        .run("create bgp peer api")
        .await
        .unwrap();

    let second = Arc::new(ScriptedProvider::new(vec![text_response("def configure_bgp_route(self): pass")]));
    fx.agent(second.clone(), fx.open_memory())
        .run("create bgp route api")
        .await
        .unwrap();

    let system = second.system_prompt(0);
    assert!(system.contains(CONTEXT_HEADER));
    assert!(system.contains("configure_bgp_peer"), "system prompt: {system}");

    let output = fx.output().unwrap();
    assert!(output.find("configure_bgp_peer").unwrap() < output.find("configure_bgp_route").unwrap());
}

#[tokio::test]
async fn e2e_feedback_and_ingest_feed_recall() {
    let fx = Fixture::new();
    let memory = fx.open_memory();

    let report = ingest_files(
        memory.as_ref(),
        &SandboxRoot::new(fx.root()),
        &["ixia.py".to_string(), "missing.py".to_string(), "../outside.py".to_string()],
    )
    .await
    .unwrap();
    assert_eq!(report.stored.len(), 1);
    assert_eq!(report.skipped.len(), 2);

    store_correction(
        memory.as_ref(),
        "create multicast api",
        "self.ixNetwork.Vport.DeviceGroup.add()",
        "self.ixNetwork.Topology.add().DeviceGroup.add()",
    )
    .await
    .unwrap();

    let records = memory.records().await.unwrap();
    assert_eq!(records[0].metadata.kind, RecordKind::SourceIngest);
    assert_eq!(records[0].metadata.source_file.as_deref(), Some("ixia.py"));
    assert_eq!(records[1].metadata.confidence, Confidence::High);
    assert_eq!(records[1].metadata.provenance, Provenance::Human);

    let provider = Arc::new(ScriptedProvider::new(vec![text_response("def configure_multicast_v2(self): pass")]));
    fx.agent(provider.clone(), memory)
        .run("create multicast api")
        .await
        .unwrap();

    let system = provider.system_prompt(0);
    assert!(system.contains("CORRECT ANSWER:"), "system prompt: {system}");
}

#[tokio::test]
async fn e2e_rejected_final_answer_aborts_without_output() {
    let fx = Fixture::new();
    let provider = Arc::new(ScriptedProvider::new(vec![text_response(
        "dg = self.ixNetwork.Vport.DeviceGroup.add()",
    )]));
    let memory = fx.open_memory();

    let err = fx.agent(provider, memory.clone()).run("create api").await.unwrap_err();
    assert!(matches!(err, Error::Agent(AgentError::Validation { .. })));
    assert!(fx.output().is_none());
    assert_eq!(memory.len().await.unwrap(), 1);
}

#[tokio::test]
async fn e2e_convergence_failure_stores_nothing() {
    let fx = Fixture::new();
    let responses = (0..3)
        .map(|i| {
            tool_response(vec![tool_call(
                &format!("r{i}"),
                "read_code",
                serde_json::json!({"file_path": "ixia.py"}),
            )])
        })
        .collect();
    let provider = Arc::new(ScriptedProvider::new(responses));
    let memory = fx.open_memory();

    let result = fx
        .agent(provider.clone(), memory.clone())
        .with_max_iterations(3)
        .run("create api")
        .await
        .unwrap();

    assert_eq!(result.to_string(), "Agent did not converge");
    assert_eq!(provider.calls(), 3);
    assert!(memory.is_empty().await.unwrap());
    assert!(fx.output().is_none());
}

#[tokio::test]
async fn e2e_sandbox_escape_is_reported_to_model() {
    let fx = Fixture::new();
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "r1",
            "read_code",
            serde_json::json!({"file_path": "../../etc/passwd"}),
        )]),
        text_response("def f(self): pass"),
    ]));

    fx.agent(provider.clone(), fx.open_memory())
        .run("create api")
        .await
        .unwrap();

    let requests = provider.requests.lock().unwrap();
    let tool_msg = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(tool_msg.content.starts_with("ERROR: "), "got: {}", tool_msg.content);
}

#[tokio::test]
async fn e2e_config_file_drives_the_loop() {
    let fx = Fixture::new();
    let path = write_config(
        fx.dir.path(),
        r#"
max_iterations = 2

[workspace]
root = "apis"
output_file = "from_config.py"

[validation]
forbidden_patterns = ["Vport.find().DeviceGroup", "Vport.DeviceGroup"]
final_answer_rejection = "recover"
"#,
    );
    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.validation.forbidden_patterns.len(), 2);

    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("x = self.ixNetwork.Vport.DeviceGroup"),
        text_response("x = self.ixNetwork.Topology.add()"),
    ]));
    let agent = AgentLoop::new(
        provider.clone(),
        config.model.clone(),
        Arc::new(ToolDispatcher::new(Arc::new(SandboxWorkspace::new(fx.root())))),
        Arc::new(PatternValidator::new(config.validation.forbidden_patterns.clone())),
        fx.open_memory(),
        Arc::new(EventBus::default()),
    )
    .configured(&config);

    let result = agent.run("create api").await.unwrap();
    assert_eq!(result.to_string(), "SUCCESS: Code written to apis/from_config.py");
    assert_eq!(provider.calls(), 2);
    let written = std::fs::read_to_string(fx.root().join("from_config.py")).unwrap();
    assert!(!written.contains("Vport"));
}
