//! Persistent vector store — a flat index on disk plus a parallel record list.
//!
//! Two files:
//! - the index (`data/memory.index` by default): JSON `{ dimension, vectors }`
//! - the metadata (`data/memory_meta.json` by default): JSON array of records
//!
//! Position `i` in the index belongs to record `i` in the metadata. Both files
//! are rewritten in full on every store while the write lock is held.

use apiforge_core::error::MemoryError;
use apiforge_core::memory::{Embedder, MemoryRecord, RecordMetadata, SimilarityMemory};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::vector::vector_search;

/// Vectors and records kept side by side, addressed by position.
#[derive(Debug, Default)]
pub(crate) struct FlatIndex {
    pub(crate) vectors: Vec<Vec<f32>>,
    pub(crate) records: Vec<MemoryRecord>,
}

impl FlatIndex {
    pub(crate) fn push(&mut self, vector: Vec<f32>, record: MemoryRecord) {
        self.vectors.push(vector);
        self.records.push(record);
    }

    /// Undo the last `push`.
    pub(crate) fn pop(&mut self) {
        self.vectors.pop();
        self.records.pop();
    }

    /// Top-k records for an already embedded query. Positions without a
    /// record (or without a vector) are never returned.
    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<MemoryRecord> {
        let usable = self.vectors.len().min(self.records.len());
        vector_search(&self.vectors[..usable], query, k)
            .into_iter()
            .map(|(pos, score)| {
                let mut record = self.records[pos].clone();
                record.score = score;
                record
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Build a fresh record for `text`.
pub(crate) fn new_record(text: &str, metadata: RecordMetadata) -> MemoryRecord {
    MemoryRecord {
        id: Uuid::new_v4().to_string(),
        text: text.to_string(),
        metadata,
        created_at: Utc::now(),
        score: 0.0,
    }
}

/// Embed `text` and check the vector length against the embedder's contract.
pub(crate) async fn embed_checked(
    embedder: &dyn Embedder,
    text: &str,
) -> Result<Vec<f32>, MemoryError> {
    let vector = embedder.embed_one(text).await?;
    if vector.len() != embedder.dimension() {
        return Err(MemoryError::DimensionMismatch {
            expected: embedder.dimension(),
            found: vector.len(),
        });
    }
    Ok(vector)
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// The durable similarity memory.
pub struct VectorStore {
    index_path: PathBuf,
    metadata_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    index: Arc<RwLock<FlatIndex>>,
}

impl VectorStore {
    /// Load the store from disk, or start a fresh one.
    ///
    /// A missing or unreadable index starts empty; a missing metadata file
    /// starts empty. An index built with a different dimension than the
    /// embedder produces is refused.
    pub fn open(
        index_path: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, MemoryError> {
        let index_path = index_path.into();
        let metadata_path = metadata_path.into();

        let vectors = Self::load_index(&index_path, embedder.dimension())?;
        let records = Self::load_metadata(&metadata_path)?;

        if vectors.len() != records.len() {
            warn!(
                vectors = vectors.len(),
                records = records.len(),
                "Index and metadata lengths differ; unmatched positions are ignored"
            );
        }

        info!(
            index = %index_path.display(),
            records = records.len(),
            embedder = %embedder.kind(),
            dimension = embedder.dimension(),
            "Vector store opened"
        );

        Ok(Self {
            index_path,
            metadata_path,
            embedder,
            index: Arc::new(RwLock::new(FlatIndex { vectors, records })),
        })
    }

    fn load_index(path: &Path, dimension: usize) -> Result<Vec<Vec<f32>>, MemoryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = %path.display(), "No index on disk, starting fresh");
                return Ok(Vec::new());
            }
        };

        let file: IndexFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable index, starting fresh");
                return Ok(Vec::new());
            }
        };

        if file.dimension != dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                found: file.dimension,
            });
        }

        if let Some(bad) = file.vectors.iter().find(|v| v.len() != dimension) {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }

        Ok(file.vectors)
    }

    fn load_metadata(path: &Path) -> Result<Vec<MemoryRecord>, MemoryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()),
        };

        // Starting empty here would erase every record on the next store.
        serde_json::from_str(&content).map_err(|e| {
            MemoryError::Storage(format!(
                "Failed to parse metadata file {}: {e}",
                path.display()
            ))
        })
    }

    /// Rewrite both files from the given state.
    fn flush(&self, index: &FlatIndex) -> Result<(), MemoryError> {
        for path in [&self.index_path, &self.metadata_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MemoryError::Storage(format!("Failed to create memory directory: {e}"))
                })?;
            }
        }

        let index_file = IndexFile {
            dimension: self.embedder.dimension(),
            vectors: index.vectors.clone(),
        };
        let index_json = serde_json::to_string(&index_file)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize index: {e}")))?;
        std::fs::write(&self.index_path, index_json)
            .map_err(|e| MemoryError::Storage(format!("Failed to write index file: {e}")))?;

        let meta_json = serde_json::to_string_pretty(&index.records)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize metadata: {e}")))?;
        std::fs::write(&self.metadata_path, meta_json)
            .map_err(|e| MemoryError::Storage(format!("Failed to write metadata file: {e}")))?;

        Ok(())
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}

#[async_trait]
impl SimilarityMemory for VectorStore {
    fn name(&self) -> &str {
        "vector_file"
    }

    async fn store(&self, text: &str, metadata: RecordMetadata) -> Result<String, MemoryError> {
        let vector = embed_checked(self.embedder.as_ref(), text).await?;
        let record = new_record(text, metadata);
        let id = record.id.clone();

        let mut index = self.index.write().await;
        index.push(vector, record);
        if let Err(e) = self.flush(&index) {
            // A failed store must not be recalled or written by a later flush.
            index.pop();
            warn!(id = %id, error = %e, "Memory record not persisted");
            return Err(e);
        }

        debug!(id = %id, total = index.len(), "Memory record stored");
        Ok(id)
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        if k == 0 || self.index.read().await.len() == 0 {
            return Ok(Vec::new());
        }
        let q = embed_checked(self.embedder.as_ref(), query).await?;
        Ok(self.index.read().await.search(&q, k))
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.index.read().await.len())
    }

    async fn records(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self.index.read().await.records.clone())
    }
}
