//! Steps hosted by the knowledge pipeline.

use super::scoring::ConfidenceScorer;
use super::state::{Citation, KnowledgeField, KnowledgeState, RetrievedChunk};
use crate::clients::{
    DocumentSource, Embedder, IndexEntry, TextGenerator, VectorIndex, DOCUMENT_STORE,
    EMBEDDING_MODEL, GENERATION_MODEL, VECTOR_STORE,
};
use crate::config::CopilotConfig;
use crate::engine::Step;
use crate::envelope::RunContext;
use crate::errors::Error;
use crate::schedule::{self, SchedulingHints};
use crate::util::{split_chunks, truncate_chars, word_count};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use std::sync::Arc;

/// Name of the ingestion step.
pub const INGEST: &str = "ingest";
/// Name of the retrieval step.
pub const RETRIEVE: &str = "retrieve";
/// Name of the answer-generation step.
pub const ANSWER: &str = "answer";
/// Name of the reflection step.
pub const REFLECT: &str = "reflect";
/// Name of the scheduling-parse step.
pub const SCHEDULE_PARSE: &str = "schedule_parse";

/// Fixed answer written when retrieval produced nothing to ground on.
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have relevant information to answer that question.";

/// Suffix appended to low-confidence answers asking for clarification.
pub const CLARIFICATION_SUFFIX: &str = "\n\n(Note: I'm not very confident in this answer. \
     Could you provide more specific details or rephrase your question?)";

/// Fetches a document, chunks it, embeds the chunks, and upserts them into
/// the vector index.
pub struct IngestStep {
    documents: Arc<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestStep {
    /// Creates the step with injected collaborators.
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentSource>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &CopilotConfig,
    ) -> Self {
        Self {
            documents,
            embedder,
            index,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

#[async_trait]
impl Step<KnowledgeState> for IngestStep {
    fn name(&self) -> &str {
        INGEST
    }

    fn requires(&self) -> &[KnowledgeField] {
        &[KnowledgeField::DocumentId]
    }

    async fn run(&self, state: &mut KnowledgeState, ctx: &RunContext) -> Result<(), Error> {
        let document_id = state.document_id.clone().unwrap_or_default();

        let documents = &self.documents;
        let text = ctx
            .guarded_call(DOCUMENT_STORE, || documents.fetch(&document_id))
            .await?;

        let chunks = split_chunks(&text, self.chunk_size, self.chunk_overlap);
        let tokens = word_count(&text);

        let mut entries = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let embedder = &self.embedder;
            let vector = ctx
                .guarded_call(EMBEDDING_MODEL, || embedder.embed(chunk))
                .await?;
            entries.push(IndexEntry {
                id: format!("{document_id}_chunk_{i}"),
                vector,
                text: chunk.clone(),
                document_id: document_id.clone(),
                title: format!("Document {document_id}"),
            });
        }

        if !entries.is_empty() {
            let index = &self.index;
            let batch = entries;
            ctx.guarded_call(VECTOR_STORE, || index.upsert(batch.clone()))
                .await?;
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            document_id = %document_id,
            chunks = chunks.len(),
            "document ingested"
        );
        state.ingested_chunks = Some(chunks.len());
        state.ingested_tokens = Some(tokens);
        Ok(())
    }
}

/// Embeds the query and fetches the k nearest chunks from the vector index.
pub struct RetrieveStep {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    k: usize,
}

impl RetrieveStep {
    /// Creates the step with injected collaborators.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, config: &CopilotConfig) -> Self {
        Self {
            embedder,
            index,
            k: config.retrieval_k,
        }
    }
}

#[async_trait]
impl Step<KnowledgeState> for RetrieveStep {
    fn name(&self) -> &str {
        RETRIEVE
    }

    fn requires(&self) -> &[KnowledgeField] {
        &[KnowledgeField::Query]
    }

    async fn run(&self, state: &mut KnowledgeState, ctx: &RunContext) -> Result<(), Error> {
        let embedder = &self.embedder;
        let query = state.query.clone();
        let vector = ctx
            .guarded_call(EMBEDDING_MODEL, || embedder.embed(&query))
            .await?;

        let index = &self.index;
        let matches = ctx
            .guarded_call(VECTOR_STORE, || index.query(&vector, self.k))
            .await?;

        // Zero matches is a valid outcome, not an error: "no relevant
        // knowledge" is a legitimate terminal answer.
        let chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .map(|m| RetrievedChunk {
                text: m.text,
                source_document_id: m.document_id,
                source_title: m.title,
                similarity_score: m.similarity,
            })
            .collect();

        tracing::info!(
            request_id = %ctx.request_id(),
            retrieved = chunks.len(),
            "retrieval complete"
        );
        state.retrieved_chunks = Some(chunks);
        Ok(())
    }
}

/// Generates a grounded answer with one citation per context chunk.
pub struct AnswerStep {
    generator: Arc<dyn TextGenerator>,
    scorer: Arc<dyn ConfidenceScorer>,
    excerpt_chars: usize,
    snippet_chars: usize,
}

impl AnswerStep {
    /// Creates the step with injected collaborators.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        scorer: Arc<dyn ConfidenceScorer>,
        config: &CopilotConfig,
    ) -> Self {
        Self {
            generator,
            scorer,
            excerpt_chars: config.context_excerpt_chars,
            snippet_chars: config.citation_snippet_chars,
        }
    }

    fn build_context(&self, chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}", i + 1, truncate_chars(&chunk.text, self.excerpt_chars)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl Step<KnowledgeState> for AnswerStep {
    fn name(&self) -> &str {
        ANSWER
    }

    fn requires(&self) -> &[KnowledgeField] {
        &[KnowledgeField::Query, KnowledgeField::RetrievedChunks]
    }

    async fn run(&self, state: &mut KnowledgeState, ctx: &RunContext) -> Result<(), Error> {
        let chunks = state.retrieved_chunks.clone().unwrap_or_default();

        if chunks.is_empty() {
            // Grounding is impossible; skip the model call entirely.
            state.answer = Some(NO_INFORMATION_ANSWER.to_string());
            state.citations = Some(Vec::new());
            state.confidence = Some(0.1);
            return Ok(());
        }

        let context = self.build_context(&chunks);
        let prompt = format!(
            "Based on the following context, answer the user's question. \
             Be concise and accurate. Cite sources using [1], [2], etc.\n\n\
             Context:\n{context}\n\nQuestion: {query}\n\nAnswer with citations:",
            query = state.query,
        );

        let generator = &self.generator;
        let answer = ctx
            .guarded_call(GENERATION_MODEL, || generator.generate(&prompt))
            .await?;

        let citations: Vec<Citation> = chunks
            .iter()
            .map(|chunk| Citation {
                title: chunk.source_title.clone(),
                source_document_id: chunk.source_document_id.clone(),
                snippet: truncate_chars(&chunk.text, self.snippet_chars).to_string(),
                page_ranges: None,
            })
            .collect();

        state.answer = Some(answer);
        state.citations = Some(citations);
        state.confidence = Some(self.scorer.score(&chunks));
        Ok(())
    }
}

/// Reviews answer quality and scans the query for follow-up scheduling.
pub struct ReflectStep {
    generator: Arc<dyn TextGenerator>,
    reflect_threshold: f64,
    clarify_threshold: f64,
}

impl ReflectStep {
    /// Creates the step with injected collaborators.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, config: &CopilotConfig) -> Self {
        Self {
            generator,
            reflect_threshold: config.reflect_threshold,
            clarify_threshold: config.clarify_threshold,
        }
    }
}

#[async_trait]
impl Step<KnowledgeState> for ReflectStep {
    fn name(&self) -> &str {
        REFLECT
    }

    fn requires(&self) -> &[KnowledgeField] {
        &[
            KnowledgeField::Answer,
            KnowledgeField::Confidence,
            KnowledgeField::Query,
        ]
    }

    async fn run(&self, state: &mut KnowledgeState, ctx: &RunContext) -> Result<(), Error> {
        if schedule::mentions_scheduling(&state.query) {
            let hints = schedule::extract_hints(&state.query);
            if !hints.is_empty() {
                state.follow_up = Some(hints);
            }
        }

        let confidence = state.confidence.unwrap_or(0.0);
        if confidence < self.reflect_threshold {
            let prompt = format!(
                "Review this Q&A for accuracy and completeness:\n\n\
                 Question: {query}\nAnswer: {answer}\nConfidence: {confidence}\n\n\
                 Is the answer accurate and complete? Should we request clarification? \
                 Respond with a brief assessment.",
                query = state.query,
                answer = state.answer.as_deref().unwrap_or_default(),
            );
            // Telemetry only: the review never alters state, and its failure
            // never fails the run.
            let generator = &self.generator;
            match ctx
                .guarded_call(GENERATION_MODEL, || generator.generate(&prompt))
                .await
            {
                Ok(review) => {
                    tracing::info!(request_id = %ctx.request_id(), review = %review, "self-reflection");
                }
                Err(err) => {
                    tracing::warn!(request_id = %ctx.request_id(), error = %err, "reflection review failed");
                }
            }

            if confidence < self.clarify_threshold {
                if let Some(answer) = &mut state.answer {
                    answer.push_str(CLARIFICATION_SUFFIX);
                }
            }
        }
        Ok(())
    }
}

/// Resolves scheduling hints (or re-scans raw text) into a concrete slot.
pub struct ScheduleParseStep {
    timezone: FixedOffset,
    require_explicit_time: bool,
}

impl ScheduleParseStep {
    /// Creates the step from configuration.
    #[must_use]
    pub fn new(config: &CopilotConfig) -> Self {
        Self {
            timezone: config.timezone,
            require_explicit_time: config.require_explicit_time,
        }
    }
}

#[async_trait]
impl Step<KnowledgeState> for ScheduleParseStep {
    fn name(&self) -> &str {
        SCHEDULE_PARSE
    }

    fn requires(&self) -> &[KnowledgeField] {
        &[KnowledgeField::Query]
    }

    async fn run(&self, state: &mut KnowledgeState, ctx: &RunContext) -> Result<(), Error> {
        // When invoked standalone the reflection step never ran, so the raw
        // query text is re-scanned.
        let hints: SchedulingHints = match &state.follow_up {
            Some(hints) if !hints.is_empty() => hints.clone(),
            _ => schedule::extract_hints(&state.query),
        };

        let now = Utc::now().with_timezone(&self.timezone);
        let slot = if self.require_explicit_time {
            schedule::resolve_strict(&hints, now)?
        } else {
            schedule::resolve(&hints, now)
        };

        tracing::info!(
            request_id = %ctx.request_id(),
            title = %slot.title,
            start = %slot.start,
            "scheduling parsed"
        );
        state.schedule = Some(slot);
        Ok(())
    }
}
