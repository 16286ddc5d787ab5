//! The facade the host process talks to.
//!
//! One [`Copilot`] is built at startup and shared across concurrent
//! requests; each operation creates a fresh request context (id, deadline)
//! and runs the appropriate pipeline.

use crate::clients::Collaborators;
use crate::config::CopilotConfig;
use crate::dealflow::{
    self, DealflowState, Lead, LeadEnrichment, ProposalCopy, StatusClassification,
};
use crate::engine::{EngineFailure, Graph, GraphValidationError, State};
use crate::envelope::RunContext;
use crate::errors::RequestError;
use crate::knowledge::{self, Citation, KnowledgeState};
use crate::resilience::BreakerRegistry;
use crate::router::{IntentClassification, IntentRouter, PipelineSelection};
use crate::schedule::MeetingSlot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A grounded answer with its citations and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeAnswer {
    /// Correlation id of the request that produced this answer.
    pub request_id: Uuid,
    /// The answer text.
    pub answer: String,
    /// Citations in context order, one per chunk used.
    pub citations: Vec<Citation>,
    /// Retrieval-derived confidence in `[0, 1]`.
    pub confidence: f64,
    /// A resolved follow-up slot, when the query asked for one.
    pub follow_up: Option<MeetingSlot>,
}

/// The outcome of a document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Correlation id of the request.
    pub request_id: Uuid,
    /// The ingested document.
    pub document_id: String,
    /// Chunks written to the vector index.
    pub chunks: usize,
    /// Approximate token count of the document.
    pub tokens: usize,
}

/// The outcome of a lead capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedLead {
    /// Correlation id of the request.
    pub request_id: Uuid,
    /// The extracted lead.
    pub lead: Lead,
    /// Enrichment derived from the lead.
    pub enrichment: Option<LeadEnrichment>,
    /// Whether extraction degraded to pattern matching.
    pub used_fallback_extraction: bool,
}

/// The shared entry point for all copilot operations.
pub struct Copilot {
    config: CopilotConfig,
    breakers: Arc<BreakerRegistry>,
    router: IntentRouter,
    knowledge: Graph<KnowledgeState>,
    dealflow: Graph<DealflowState>,
}

impl Copilot {
    /// Builds the copilot, validating both pipeline graphs up front so a
    /// misconfigured graph can never receive traffic.
    pub fn new(
        config: CopilotConfig,
        collaborators: &Collaborators,
    ) -> Result<Self, GraphValidationError> {
        let knowledge = knowledge::build_graph(collaborators, &config)?;
        let dealflow = dealflow::build_graph(collaborators, &config)?;
        let breakers = Arc::new(config.breaker_registry());
        let router = IntentRouter::new(collaborators.generator.clone());
        Ok(Self {
            config,
            breakers,
            router,
            knowledge,
            dealflow,
        })
    }

    fn context(&self) -> RunContext {
        RunContext::new(self.breakers.clone(), self.config.retry.clone())
            .with_timeout(self.config.request_timeout)
    }

    /// Answers a question from ingested knowledge.
    pub async fn ask(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<KnowledgeAnswer, RequestError> {
        let ctx = self.context();
        let state = KnowledgeState::for_query(user_id, query);
        let state = self
            .knowledge
            .execute(state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        Ok(KnowledgeAnswer {
            request_id: ctx.request_id(),
            answer: state.answer.unwrap_or_default(),
            citations: state.citations.unwrap_or_default(),
            confidence: state.confidence.unwrap_or(0.0),
            follow_up: state.schedule,
        })
    }

    /// Ingests a document into the knowledge base.
    pub async fn ingest(&self, document_id: &str) -> Result<IngestionReport, RequestError> {
        let ctx = self.context();
        let state = KnowledgeState::for_ingest(document_id);
        let state = self
            .knowledge
            .execute_single(knowledge::INGEST, state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        Ok(IngestionReport {
            request_id: ctx.request_id(),
            document_id: document_id.to_string(),
            chunks: state.ingested_chunks.unwrap_or(0),
            tokens: state.ingested_tokens.unwrap_or(0),
        })
    }

    /// Resolves freeform follow-up text into a concrete meeting slot.
    pub async fn parse_follow_up(&self, text: &str) -> Result<MeetingSlot, RequestError> {
        let ctx = self.context();
        let state = KnowledgeState::for_schedule_text(text);
        let state = self
            .knowledge
            .execute_single(knowledge::SCHEDULE_PARSE, state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        state.schedule.ok_or_else(|| {
            RequestError::new(
                ctx.request_id(),
                crate::errors::Error::SchedulingParse {
                    reason: "no slot was resolved".to_string(),
                },
            )
        })
    }

    /// Captures a lead from freeform text: extraction plus enrichment.
    pub async fn capture_lead(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<CapturedLead, RequestError> {
        let ctx = self.context();
        let state = DealflowState::for_text(user_id, text);
        let state = self
            .dealflow
            .execute(state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        Ok(CapturedLead {
            request_id: ctx.request_id(),
            lead: state.lead.unwrap_or_default(),
            enrichment: state.enrichment,
            used_fallback_extraction: state.used_fallback_extraction,
        })
    }

    /// Drafts proposal copy for an already-captured lead.
    pub async fn draft_proposal(
        &self,
        user_id: &str,
        lead: Lead,
    ) -> Result<ProposalCopy, RequestError> {
        let ctx = self.context();
        let mut state = DealflowState::for_text(user_id, "proposal request");
        state.lead = Some(lead);
        let state = self
            .dealflow
            .execute_single(dealflow::GENERATE_PROPOSAL, state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        state.proposal.ok_or_else(|| {
            RequestError::new(
                ctx.request_id(),
                crate::errors::Error::unexpected(
                    crate::clients::GENERATION_MODEL,
                    "proposal step produced no copy",
                ),
            )
        })
    }

    /// Resolves next-step text into a concrete meeting slot.
    pub async fn parse_next_step(&self, text: &str) -> Result<MeetingSlot, RequestError> {
        let ctx = self.context();
        let state = DealflowState::for_text("system", text);
        let state = self
            .dealflow
            .execute_single(dealflow::PARSE_NEXT_STEP, state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        state.schedule.ok_or_else(|| {
            RequestError::new(
                ctx.request_id(),
                crate::errors::Error::SchedulingParse {
                    reason: "no slot was resolved".to_string(),
                },
            )
        })
    }

    /// Classifies a deal status update.
    pub async fn classify_status(
        &self,
        text: &str,
    ) -> Result<StatusClassification, RequestError> {
        let ctx = self.context();
        let state = DealflowState::for_text("system", text);
        let state = self
            .dealflow
            .execute_single(dealflow::CLASSIFY_STATUS, state, &ctx)
            .await
            .map_err(|failure| request_error(&ctx, failure))?;

        state.status.ok_or_else(|| {
            RequestError::new(
                ctx.request_id(),
                crate::errors::Error::unexpected(
                    crate::clients::GENERATION_MODEL,
                    "status step produced no classification",
                ),
            )
        })
    }

    /// Classifies a message's intent without running any pipeline.
    pub async fn classify(
        &self,
        text: &str,
        has_attachments: bool,
        prior_context: Option<&str>,
    ) -> IntentClassification {
        let ctx = self.context();
        self.router
            .classify(text, has_attachments, prior_context, &ctx)
            .await
    }

    /// Classifies a message and returns the pipeline it should be routed to.
    pub async fn route(
        &self,
        text: &str,
        has_attachments: bool,
        prior_context: Option<&str>,
    ) -> (IntentClassification, PipelineSelection) {
        let classification = self.classify(text, has_attachments, prior_context).await;
        let selection = crate::router::select_pipeline(&classification, has_attachments);
        (classification, selection)
    }
}

fn request_error<S: State>(ctx: &RunContext, failure: EngineFailure<S>) -> RequestError {
    RequestError::new(ctx.request_id(), failure.into_error())
}
