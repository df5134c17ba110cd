//! `apiforge run` — one generation cycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use apiforge_agent::AgentLoop;
use apiforge_core::event::{DomainEvent, EventBus};
use apiforge_core::validator::PatternValidator;
use apiforge_tools::ToolDispatcher;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;

    let request = match (message, file) {
        (Some(message), _) => message,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read request from {}", file.display()))?,
        (None, None) => config.run.default_request.clone(),
    };
    anyhow::ensure!(!request.trim().is_empty(), "The request is empty");

    let provider = runtime::provider(&config)?;
    let memory = runtime::memory(&config)?;
    let tools = Arc::new(ToolDispatcher::new(Arc::new(runtime::workspace(&config))));
    let validator = Arc::new(PatternValidator::new(
        config.validation.forbidden_patterns.clone(),
    ));

    let event_bus = Arc::new(EventBus::default());
    let reporter = tokio::spawn(report_events(event_bus.subscribe()));

    let mut agent = AgentLoop::new(
        provider,
        config.model.clone(),
        tools,
        validator,
        memory,
        event_bus,
    )
    .configured(&config);
    if let Some(prompt) = config.prompt.resolve()? {
        agent = agent.with_system_prompt(prompt);
    }

    info!(
        provider = %config.provider,
        model = %config.model,
        output = %config.workspace.output_location(),
        "Running agent"
    );

    println!("\n--- AGENT WILL GIVE THE OUTPUT API IN SOMETIME ---\n");
    let result = agent.run(&request).await;
    // Dropping the agent closes the bus so the reporter drains and exits.
    drop(agent);
    let _ = reporter.await;
    println!("{}", result?);

    Ok(())
}

/// Print rejections as they happen until the bus closes. Returns how many
/// were printed.
async fn report_events(mut events: Receiver<Arc<DomainEvent>>) -> usize {
    let mut rejections = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event reporter fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if let DomainEvent::ValidationRejected { pattern, site, .. } = event.as_ref() {
            eprintln!("  [rejected] {site:?}: {pattern}");
            rejections += 1;
        }
        debug!(event = ?event, "Domain event");
    }
    rejections
}
