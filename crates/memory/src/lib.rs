//! Similarity memory implementations for apiforge.

pub mod embedder;
pub mod in_memory;
pub mod ingest;
pub mod rag;
pub mod vector;
pub mod vector_store;

pub use embedder::{ProviderEmbedder, TokenHashEmbedder};
pub use in_memory::InMemoryStore;
pub use ingest::{IngestReport, ingest_files};
pub use rag::{RecalledContext, join_context, retrieve_context, store_correction};
pub use vector::{cosine_similarity, vector_search};
pub use vector_store::VectorStore;
