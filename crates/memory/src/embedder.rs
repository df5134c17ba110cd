//! Embedders that turn record text into vectors.
//!
//! - [`TokenHashEmbedder`]: deterministic, offline feature hashing. Needs no
//!   model download or network access, so it is the default.
//! - [`ProviderEmbedder`]: delegates to the completion service's embeddings
//!   endpoint.

use apiforge_core::error::MemoryError;
use apiforge_core::memory::Embedder;
use apiforge_core::provider::{EmbeddingRequest, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Default vector length, shared with the configuration default.
pub const DEFAULT_DIMENSION: usize = 384;

/// Feature-hashing embedder over lowercase word tokens.
///
/// Each token is hashed with FNV-1a; the low bits pick a bucket and bit 32
/// picks the sign. The result is L2-normalised, so cosine similarity reduces
/// to a dot product.
#[derive(Debug, Clone)]
pub struct TokenHashEmbedder {
    dimension: usize,
}

impl TokenHashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let h = fnv1a64(&token);
            let idx = (h % self.dimension as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        normalize(&mut v);
        v
    }
}

impl Default for TokenHashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for TokenHashEmbedder {
    fn kind(&self) -> &str {
        "token_hash"
    }

    fn model(&self) -> &str {
        "fnv1a-token-hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Embedder backed by a provider's `/embeddings` endpoint.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn kind(&self) -> &str {
        "provider"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            count = texts.len(),
            "Embedding via provider"
        );

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts.to_vec(),
            })
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != texts.len() {
            return Err(MemoryError::EmbeddingFailed(format!(
                "expected {} vectors, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(|mut v| {
                if v.len() != self.dimension {
                    return Err(MemoryError::DimensionMismatch {
                        expected: self.dimension,
                        found: v.len(),
                    });
                }
                normalize(&mut v);
                Ok(v)
            })
            .collect()
    }
}

fn fnv1a64(s: &str) -> u64 {
    let mut h: u64 = 14695981039346656037;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    h
}

/// Split on anything that is not alphanumeric or `_`, lowercased.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Scale a vector to unit length in place. Zero vectors are left as is.
pub fn normalize(v: &mut [f32]) {
    let norm2: f32 = v.iter().map(|x| x * x).sum();
    if norm2 > 0.0 {
        let inv = 1.0 / norm2.sqrt();
        for x in v.iter_mut() {
            *x *= inv;
        }
    }
}
