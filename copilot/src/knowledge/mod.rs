//! Knowledge pipeline: document ingestion, grounded question answering with
//! citations, confidence-gated reflection, and follow-up scheduling.

mod pipeline;
mod scoring;
mod state;
mod steps;

pub use pipeline::{build_graph, GRAPH_NAME};
pub use scoring::{ChunkLengthScorer, ConfidenceScorer};
pub use state::{Citation, KnowledgeField, KnowledgeState, RetrievedChunk};
pub use steps::{
    AnswerStep, IngestStep, ReflectStep, RetrieveStep, ScheduleParseStep, ANSWER, CLARIFICATION_SUFFIX,
    INGEST, NO_INFORMATION_ANSWER, REFLECT, RETRIEVE, SCHEDULE_PARSE,
};
