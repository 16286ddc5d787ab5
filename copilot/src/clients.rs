//! Collaborator ports for external services.
//!
//! The core never owns a model client or a vector store; it consumes these
//! contracts and leaves the transport to the host process. Implementations
//! are expected to classify their own failures: transient trouble (timeouts,
//! rate limits) via [`Error::integration`], everything else via
//! [`Error::unexpected`] or [`Error::document_fetch`].

use crate::errors::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Breaker key for the text-generation service.
pub const GENERATION_MODEL: &str = "generation-model";
/// Breaker key for the embedding service.
pub const EMBEDDING_MODEL: &str = "embedding-model";
/// Breaker key for the vector store.
pub const VECTOR_STORE: &str = "vector-store";
/// Breaker key for the document source.
pub const DOCUMENT_STORE: &str = "document-store";

/// Text-generation service contract.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String, Error>;
}

/// Embedding service contract.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;
}

/// One entry to upsert into the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique chunk id.
    pub id: String,
    /// The chunk embedding.
    pub vector: Vec<f32>,
    /// The chunk text.
    pub text: String,
    /// Source document identifier.
    pub document_id: String,
    /// Source document title.
    pub title: String,
}

/// One nearest-neighbor match from the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMatch {
    /// The matched chunk text.
    pub text: String,
    /// Source document identifier.
    pub document_id: String,
    /// Source document title.
    pub title: String,
    /// Similarity score, higher is closer.
    pub similarity: f64,
}

/// Vector store contract.
///
/// The store is eventually consistent: a chunk just upserted may not be
/// immediately queryable, which callers accept.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces entries.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), Error>;

    /// Returns up to `k` nearest neighbors ordered by descending similarity.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexMatch>, Error>;
}

/// Document source contract (remote file store).
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Returns the raw text of a document.
    async fn fetch(&self, document_id: &str) -> Result<String, Error>;
}

/// The bundle of collaborator handles injected into pipelines.
///
/// Constructed once by the host and shared read-only across concurrent
/// requests.
#[derive(Clone)]
pub struct Collaborators {
    /// Text-generation client.
    pub generator: Arc<dyn TextGenerator>,
    /// Embedding client.
    pub embedder: Arc<dyn Embedder>,
    /// Vector index handle.
    pub index: Arc<dyn VectorIndex>,
    /// Document source handle.
    pub documents: Arc<dyn DocumentSource>,
}
