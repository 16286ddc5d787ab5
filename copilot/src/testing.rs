//! In-memory collaborator stubs for tests.
//!
//! Each stub counts its calls so tests can assert not just on outcomes but on
//! which external services were (or were not) consulted.

use crate::clients::{
    Collaborators, DocumentSource, Embedder, IndexEntry, IndexMatch, TextGenerator, VectorIndex,
    GENERATION_MODEL,
};
use crate::errors::Error;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted text generator.
pub struct StubGenerator {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    /// Returns `reply` for every call.
    #[must_use]
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the scripted replies in order, then repeats the last one.
    #[must_use]
    pub fn script(replies: Vec<&str>) -> Self {
        let fallback = replies.last().map(|s| (*s).to_string());
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            fallback,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with a non-transient error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent prompt, if any call was made.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }
        self.fallback
            .clone()
            .ok_or_else(|| Error::unexpected(GENERATION_MODEL, "stubbed generation failure"))
    }
}

/// Deterministic embedder producing fixed-length vectors.
pub struct StubEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl StubEmbedder {
    /// Creates an embedder producing vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Length-derived so different texts usually get different vectors.
        #[allow(clippy::cast_precision_loss)]
        let seed = text.len() as f32;
        Ok((0..self.dimension).map(|i| seed + i as f32).collect())
    }
}

/// In-memory vector index with scripted query results.
pub struct StubIndex {
    matches: Mutex<Vec<IndexMatch>>,
    upserted: Mutex<Vec<IndexEntry>>,
    query_calls: AtomicUsize,
}

impl StubIndex {
    /// An index that returns no matches.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_matches(Vec::new())
    }

    /// An index that returns the given matches, truncated to `k`.
    #[must_use]
    pub fn with_matches(matches: Vec<IndexMatch>) -> Self {
        Self {
            matches: Mutex::new(matches),
            upserted: Mutex::new(Vec::new()),
            query_calls: AtomicUsize::new(0),
        }
    }

    /// Appends a canned match with default source metadata.
    pub fn seed_match(&self, text: &str) {
        self.matches.lock().push(IndexMatch {
            text: text.to_string(),
            document_id: "doc-1".to_string(),
            title: "Document doc-1".to_string(),
            similarity: 0.9,
        });
    }

    /// Number of entries upserted so far.
    pub fn upserted_len(&self) -> usize {
        self.upserted.lock().len()
    }

    /// Number of `query` calls so far.
    pub fn query_count(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for StubIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), Error> {
        self.upserted.lock().extend(entries);
        Ok(())
    }

    async fn query(&self, _vector: &[f32], k: usize) -> Result<Vec<IndexMatch>, Error> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let matches = self.matches.lock();
        Ok(matches.iter().take(k).cloned().collect())
    }
}

/// Document source backed by a single in-memory text.
pub struct StubDocuments {
    text: Mutex<Option<String>>,
}

impl StubDocuments {
    /// A source with no documents; every fetch fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            text: Mutex::new(None),
        }
    }

    /// A source returning `text` for every document id.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Mutex::new(Some(text.to_string())),
        }
    }

    /// Replaces the stored text.
    pub fn set_text(&self, text: &str) {
        *self.text.lock() = Some(text.to_string());
    }
}

#[async_trait]
impl DocumentSource for StubDocuments {
    async fn fetch(&self, document_id: &str) -> Result<String, Error> {
        self.text
            .lock()
            .clone()
            .ok_or_else(|| Error::document_fetch(document_id, "no document stored"))
    }
}

/// Handles onto the stubs inside a [`Collaborators`] bundle.
pub struct StubHandles {
    /// The generator stub.
    pub generator: Arc<StubGenerator>,
    /// The embedder stub.
    pub embedder: Arc<StubEmbedder>,
    /// The vector index stub.
    pub index: Arc<StubIndex>,
    /// The document source stub.
    pub documents: Arc<StubDocuments>,
}

/// Builds a fully stubbed collaborator bundle plus handles for assertions.
#[must_use]
pub fn stub_collaborators() -> (Collaborators, StubHandles) {
    let generator = Arc::new(StubGenerator::always("Stubbed answer [1]."));
    let embedder = Arc::new(StubEmbedder::new(8));
    let index = Arc::new(StubIndex::empty());
    let documents = Arc::new(StubDocuments::with_text("Stubbed document text."));

    let collaborators = Collaborators {
        generator: generator.clone(),
        embedder: embedder.clone(),
        index: index.clone(),
        documents: documents.clone(),
    };
    let handles = StubHandles {
        generator,
        embedder,
        index,
        documents,
    };
    (collaborators, handles)
}
