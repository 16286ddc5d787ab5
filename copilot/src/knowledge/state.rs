//! Typed state for knowledge pipeline runs.

use crate::engine::State;
use crate::schedule::{MeetingSlot, SchedulingHints};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One chunk returned by nearest-neighbor retrieval. Read-only once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The chunk text.
    pub text: String,
    /// Identifier of the source document.
    pub source_document_id: String,
    /// Title of the source document.
    pub source_title: String,
    /// Similarity score, higher is closer.
    pub similarity_score: f64,
}

/// A citation derived 1:1 from a retrieved chunk used in the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Document title.
    pub title: String,
    /// Source document identifier.
    pub source_document_id: String,
    /// Relevant text snippet.
    pub snippet: String,
    /// Page numbers or sections, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ranges: Option<Vec<String>>,
}

/// Fields of [`KnowledgeState`] that steps may declare as requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeField {
    /// The user's query text.
    Query,
    /// The document to ingest.
    DocumentId,
    /// Retrieval results (possibly empty).
    RetrievedChunks,
    /// The generated answer.
    Answer,
    /// Retrieval-derived confidence.
    Confidence,
    /// Scheduling hints found during reflection.
    FollowUp,
}

impl fmt::Display for KnowledgeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::DocumentId => "document_id",
            Self::RetrievedChunks => "retrieved_chunks",
            Self::Answer => "answer",
            Self::Confidence => "confidence",
            Self::FollowUp => "follow_up",
        };
        f.write_str(name)
    }
}

/// Mutable state threaded through one knowledge pipeline run.
///
/// Created with caller-supplied seed fields, mutated in place by steps, and
/// discarded when the run finishes; it is never persisted or shared across
/// runs.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeState {
    /// Requesting user, for logging only.
    pub user_id: String,
    /// The query text (empty for ingest-only runs).
    pub query: String,
    /// Document to ingest, when this run ingests.
    pub document_id: Option<String>,
    /// Number of chunks written during ingestion.
    pub ingested_chunks: Option<usize>,
    /// Approximate token count of the ingested document.
    pub ingested_tokens: Option<usize>,
    /// Retrieval results; `Some(vec![])` means "nothing relevant", which is
    /// a valid outcome rather than an error.
    pub retrieved_chunks: Option<Vec<RetrievedChunk>>,
    /// The generated answer.
    pub answer: Option<String>,
    /// Citations for the answer, in context order.
    pub citations: Option<Vec<Citation>>,
    /// Confidence in the answer, derived from retrieval quality.
    pub confidence: Option<f64>,
    /// Scheduling hints found in the query.
    pub follow_up: Option<SchedulingHints>,
    /// Resolved follow-up slot.
    pub schedule: Option<MeetingSlot>,
}

impl KnowledgeState {
    /// Seeds state for a question-answering run.
    #[must_use]
    pub fn for_query(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    /// Seeds state for a document-ingestion run.
    #[must_use]
    pub fn for_ingest(document_id: impl Into<String>) -> Self {
        Self {
            user_id: "system".to_string(),
            document_id: Some(document_id.into()),
            ..Self::default()
        }
    }

    /// Seeds state for a standalone scheduling parse of raw text.
    #[must_use]
    pub fn for_schedule_text(text: impl Into<String>) -> Self {
        Self {
            user_id: "system".to_string(),
            query: text.into(),
            ..Self::default()
        }
    }
}

impl State for KnowledgeState {
    type Field = KnowledgeField;

    fn contains(&self, field: KnowledgeField) -> bool {
        match field {
            KnowledgeField::Query => !self.query.trim().is_empty(),
            KnowledgeField::DocumentId => self
                .document_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty()),
            KnowledgeField::RetrievedChunks => self.retrieved_chunks.is_some(),
            KnowledgeField::Answer => self.answer.is_some(),
            KnowledgeField::Confidence => self.confidence.is_some(),
            KnowledgeField::FollowUp => {
                self.follow_up.as_ref().is_some_and(|hints| !hints.is_empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_query_does_not_count_as_present() {
        let state = KnowledgeState::for_query("u1", "   ");
        assert!(!state.contains(KnowledgeField::Query));

        let state = KnowledgeState::for_query("u1", "refund policy?");
        assert!(state.contains(KnowledgeField::Query));
    }

    #[test]
    fn empty_retrieval_still_counts_as_present() {
        let mut state = KnowledgeState::for_query("u1", "q");
        assert!(!state.contains(KnowledgeField::RetrievedChunks));
        state.retrieved_chunks = Some(Vec::new());
        assert!(state.contains(KnowledgeField::RetrievedChunks));
    }

    #[test]
    fn empty_hints_do_not_count_as_follow_up() {
        let mut state = KnowledgeState::for_query("u1", "q");
        state.follow_up = Some(crate::schedule::SchedulingHints::default());
        assert!(!state.contains(KnowledgeField::FollowUp));
    }
}
