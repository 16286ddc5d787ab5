//! Wiring of the dealflow graph.

use super::state::DealflowState;
use super::steps::{
    EnrichLeadStep, NextStepParseStep, ParseLeadStep, ProposalStep, StatusClassifyStep,
    CLASSIFY_STATUS, ENRICH_LEAD, GENERATE_PROPOSAL, PARSE_LEAD, PARSE_NEXT_STEP,
};
use crate::clients::Collaborators;
use crate::config::CopilotConfig;
use crate::engine::{Graph, GraphBuilder, GraphValidationError, Route};

/// Name of the dealflow graph.
pub const GRAPH_NAME: &str = "dealflow";

/// Builds the dealflow graph.
///
/// The lead-capture path is `parse_lead -> enrich_lead`. Proposal
/// generation, next-step parsing, and status classification are registered
/// for standalone single-step execution only.
pub fn build_graph(
    collaborators: &Collaborators,
    config: &CopilotConfig,
) -> Result<Graph<DealflowState>, GraphValidationError> {
    GraphBuilder::new(GRAPH_NAME)
        .step(ParseLeadStep::new(collaborators.generator.clone()))
        .step(EnrichLeadStep)
        .step(ProposalStep::new(collaborators.generator.clone()))
        .step(NextStepParseStep::new(config))
        .step(StatusClassifyStep::new(collaborators.generator.clone()))
        .entry(PARSE_LEAD)
        .route(PARSE_LEAD, Route::always_to(ENRICH_LEAD))
        .route(ENRICH_LEAD, Route::always_end())
        .route(GENERATE_PROPOSAL, Route::always_end())
        .route(PARSE_NEXT_STEP, Route::always_end())
        .route(CLASSIFY_STATUS, Route::always_end())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RunContext;
    use crate::resilience::{BreakerRegistry, RetryPolicy};
    use crate::testing::{stub_collaborators, StubGenerator};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx() -> RunContext {
        RunContext::new(Arc::new(BreakerRegistry::default()), RetryPolicy::default())
    }

    #[tokio::test]
    async fn lead_capture_runs_parse_then_enrich() {
        let (mut collaborators, _stubs) = stub_collaborators();
        collaborators.generator = Arc::new(StubGenerator::always(
            r#"{"name": "John", "company": "Acme", "intent": "poc", "budget": "10k"}"#,
        ));
        let graph = build_graph(&collaborators, &CopilotConfig::default()).unwrap();

        let state = DealflowState::for_text("u1", "John from Acme wants a PoC, budget 10k");
        let done = graph.execute(state, &ctx()).await.unwrap();

        assert_eq!(done.lead.unwrap().company.as_deref(), Some("Acme"));
        let enrichment = done.enrichment.unwrap();
        assert_eq!(enrichment.domain_guess.as_deref(), Some("acme.com"));
        assert!((enrichment.quality_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn proposal_runs_standalone_without_enrichment() {
        let (mut collaborators, _stubs) = stub_collaborators();
        collaborators.generator =
            Arc::new(StubGenerator::always("Summary: A plan.\n- Work\n- $1 fixed"));
        let graph = build_graph(&collaborators, &CopilotConfig::default()).unwrap();

        let mut state = DealflowState::for_text("u1", "please draft a proposal");
        state.lead = Some(super::super::state::Lead {
            company: Some("Acme".to_string()),
            ..Default::default()
        });
        let done = graph
            .execute_single(GENERATE_PROPOSAL, state, &ctx())
            .await
            .unwrap();

        let proposal = done.proposal.unwrap();
        assert_eq!(proposal.summary_blurb, "A plan.");
        assert_eq!(proposal.bullet_points, vec!["Work", "$1 fixed"]);
        // Single-step execution must not continue into other steps.
        assert!(done.enrichment.is_none());
        assert!(done.status.is_none());
    }
}
