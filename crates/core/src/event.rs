//! Domain event system — observe an agent run without coupling to it.
//!
//! The agent loop publishes events as it works. The CLI and tests subscribe
//! to them; nobody is required to listen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::RejectionSite;
use crate::memory::RecordKind;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run began
    RunStarted {
        run_id: String,
        request_preview: String,
        recalled: usize,
        timestamp: DateTime<Utc>,
    },

    /// The completion service answered a turn
    ModelResponded {
        run_id: String,
        iteration: u32,
        tool_calls: usize,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was handled (dispatched or short-circuited)
    ToolDispatched {
        run_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The validator rejected a candidate
    ValidationRejected {
        run_id: String,
        site: RejectionSite,
        pattern: String,
        timestamp: DateTime<Utc>,
    },

    /// A record was written to similarity memory
    MemoryStored {
        run_id: String,
        record_id: String,
        kind: RecordKind,
        timestamp: DateTime<Utc>,
    },

    /// A run ended without a fatal error
    RunFinished {
        run_id: String,
        success: bool,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
