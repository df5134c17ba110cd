//! Similarity memory — the append-only RAG store the agent learns from.
//!
//! Records are (text, metadata) pairs. Searching embeds the query and returns
//! the nearest records, most similar first. Nothing is ever updated or deleted
//! through this contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// What a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A rejected or corrected generation. Preferred over everything else.
    Correction,
    /// A generation that passed validation and was written.
    ValidatedGeneration,
    /// Raw source ingested as reference material.
    SourceIngest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Who produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Human,
    Agent,
}

/// Classification attached to every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub kind: RecordKind,
    pub confidence: Confidence,
    pub provenance: Provenance,

    /// The run that produced this record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Source file for ingested records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl RecordMetadata {
    pub fn new(kind: RecordKind, confidence: Confidence, provenance: Provenance) -> Self {
        Self {
            kind,
            confidence,
            provenance,
            run_id: None,
            source_file: None,
        }
    }

    /// A correction supplied by a human reviewer.
    pub fn human_correction() -> Self {
        Self::new(RecordKind::Correction, Confidence::High, Provenance::Human)
    }

    /// A candidate the validator rejected during a run.
    pub fn rejected_generation() -> Self {
        Self::new(RecordKind::Correction, Confidence::Medium, Provenance::Agent)
    }

    /// A candidate that passed validation and was written.
    pub fn validated_generation() -> Self {
        Self::new(RecordKind::ValidatedGeneration, Confidence::Medium, Provenance::Agent)
    }

    /// Reference source ingested from disk.
    pub fn source_ingest(file: impl Into<String>) -> Self {
        Self {
            source_file: Some(file.into()),
            ..Self::new(RecordKind::SourceIngest, Confidence::High, Provenance::Human)
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// A single stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique ID for this record
    pub id: String,

    /// The raw text that was embedded
    pub text: String,

    /// Classification
    pub metadata: RecordMetadata,

    /// When this record was stored
    pub created_at: DateTime<Utc>,

    /// Similarity to the query (set by search operations)
    #[serde(skip)]
    pub score: f32,
}

/// The core similarity memory contract.
///
/// Implementations: persistent vector store, in-memory store (for testing).
#[async_trait]
pub trait SimilarityMemory: Send + Sync {
    /// The backend name (e.g., "vector_file", "in_memory").
    fn name(&self) -> &str;

    /// Persist a record and return its id. Storing identical inputs twice
    /// yields two distinct records.
    async fn store(&self, text: &str, metadata: RecordMetadata) -> std::result::Result<String, MemoryError>;

    /// Return at most `k` records, most similar first. Empty when the store is empty.
    async fn search(&self, query: &str, k: usize) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    /// Total number of records.
    async fn len(&self) -> std::result::Result<usize, MemoryError>;

    /// All records in insertion order.
    async fn records(&self) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    async fn is_empty(&self) -> std::result::Result<bool, MemoryError> {
        Ok(self.len().await? == 0)
    }
}

/// Turns text into vectors for the similarity memory.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short backend identifier (e.g., "token_hash", "provider").
    fn kind(&self) -> &str;

    /// Model identifier, recorded for diagnostics.
    fn model(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, MemoryError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, MemoryError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::EmbeddingFailed("embedder returned no vectors".into()))
    }
}
