//! In-memory store — useful for testing and dry runs.

use apiforge_core::error::MemoryError;
use apiforge_core::memory::{Embedder, MemoryRecord, RecordMetadata, SimilarityMemory};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::embedder::TokenHashEmbedder;
use crate::vector_store::{FlatIndex, embed_checked, new_record};

/// Same ranking as [`crate::VectorStore`], nothing written to disk.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<RwLock<FlatIndex>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_embedder(Arc::new(TokenHashEmbedder::default()))
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: Arc::new(RwLock::new(FlatIndex::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityMemory for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn store(&self, text: &str, metadata: RecordMetadata) -> Result<String, MemoryError> {
        let vector = embed_checked(self.embedder.as_ref(), text).await?;
        let record = new_record(text, metadata);
        let id = record.id.clone();
        self.index.write().await.push(vector, record);
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

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_core::memory::RecordKind;

    #[tokio::test]
    async fn store_and_search() {
        let mem = InMemoryStore::new();
        mem.store("traffic item rocev2 configuration", RecordMetadata::validated_generation())
            .await
            .unwrap();
        mem.store("bgp neighbor session", RecordMetadata::human_correction())
            .await
            .unwrap();

        let results = mem.search("bgp neighbor", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.kind, RecordKind::Correction);
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let mem = InMemoryStore::default();
        assert!(mem.search("anything", 3).await.unwrap().is_empty());
        assert!(mem.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn records_keep_insertion_order() {
        let mem = InMemoryStore::new();
        let a = mem.store("first", RecordMetadata::validated_generation()).await.unwrap();
        let b = mem.store("second", RecordMetadata::validated_generation()).await.unwrap();
        let ids: Vec<String> = mem.records().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
