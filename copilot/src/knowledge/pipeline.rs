//! Wiring of the knowledge graph.

use super::scoring::ChunkLengthScorer;
use super::state::{KnowledgeField, KnowledgeState};
use super::steps::{
    AnswerStep, IngestStep, ReflectStep, RetrieveStep, ScheduleParseStep, ANSWER, INGEST, REFLECT,
    RETRIEVE, SCHEDULE_PARSE,
};
use crate::clients::Collaborators;
use crate::config::CopilotConfig;
use crate::engine::{Graph, GraphBuilder, GraphValidationError, Route, State};
use std::sync::Arc;

/// Name of the knowledge graph.
pub const GRAPH_NAME: &str = "knowledge";

/// Builds the knowledge graph.
///
/// The question-answering path is `retrieve -> answer -> reflect`, with a
/// conditional hop to `schedule_parse` when reflection found follow-up
/// scheduling hints. `ingest` sits in front of that path for runs entered
/// at it: it continues into `retrieve` when the state also carries a query,
/// and terminates otherwise (ingest-only runs). `ingest` and
/// `schedule_parse` also run standalone via single-step execution.
pub fn build_graph(
    collaborators: &Collaborators,
    config: &CopilotConfig,
) -> Result<Graph<KnowledgeState>, GraphValidationError> {
    let scorer = Arc::new(ChunkLengthScorer {
        min_informative_chars: config.min_informative_chars,
        per_chunk: config.confidence_per_chunk,
        cap: config.confidence_cap,
    });

    GraphBuilder::new(GRAPH_NAME)
        .step(IngestStep::new(
            collaborators.documents.clone(),
            collaborators.embedder.clone(),
            collaborators.index.clone(),
            config,
        ))
        .step(RetrieveStep::new(
            collaborators.embedder.clone(),
            collaborators.index.clone(),
            config,
        ))
        .step(AnswerStep::new(
            collaborators.generator.clone(),
            scorer,
            config,
        ))
        .step(ReflectStep::new(collaborators.generator.clone(), config))
        .step(ScheduleParseStep::new(config))
        .entry(RETRIEVE)
        .route(RETRIEVE, Route::always_to(ANSWER))
        .route(ANSWER, Route::always_to(REFLECT))
        .route(
            REFLECT,
            Route::when(
                |state: &KnowledgeState| state.contains(KnowledgeField::FollowUp),
                crate::engine::Target::Step(SCHEDULE_PARSE.to_string()),
            ),
        )
        .route(REFLECT, Route::always_end())
        .route(SCHEDULE_PARSE, Route::always_end())
        .route(
            INGEST,
            Route::when(
                |state: &KnowledgeState| state.contains(KnowledgeField::Query),
                crate::engine::Target::Step(RETRIEVE.to_string()),
            ),
        )
        .route(INGEST, Route::always_end())
        .build()
}
