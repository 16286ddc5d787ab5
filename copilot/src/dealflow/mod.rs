//! Dealflow pipeline: lead capture and enrichment, proposal generation,
//! next-step scheduling, and deal-status classification.

mod pipeline;
mod state;
mod steps;

pub use pipeline::{build_graph, GRAPH_NAME};
pub use state::{
    DealflowField, DealflowState, Lead, LeadEnrichment, ProposalCopy, ReasonCategory,
    StatusClassification, StatusLabel,
};
pub use steps::{
    classify_status_keywords, extract_lead_patterns, EnrichLeadStep, NextStepParseStep,
    ParseLeadStep, ProposalStep, StatusClassifyStep, CLASSIFY_STATUS, ENRICH_LEAD,
    GENERATE_PROPOSAL, PARSE_LEAD, PARSE_NEXT_STEP,
};
