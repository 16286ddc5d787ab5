//! # Copilot
//!
//! A message-routing core for automated business assistants: inbound text is
//! classified, routed to a pipeline graph, and executed step by step with
//! typed preconditions, first-match routing, and resilient external calls.
//!
//! The crate ships two pipelines on one shared engine:
//!
//! - **Knowledge**: document ingestion, grounded question answering with
//!   citations, confidence-gated reflection, and follow-up scheduling
//! - **Dealflow**: lead capture and enrichment, proposal generation,
//!   next-step scheduling, and deal-status classification
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use copilot::prelude::*;
//!
//! let collaborators = Collaborators { /* host-provided clients */ };
//! let copilot = Copilot::new(CopilotConfig::default(), &collaborators)?;
//!
//! let answer = copilot.ask("user-1", "What is the refund policy?").await?;
//! println!("{} (confidence {})", answer.answer, answer.confidence);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod clients;
pub mod config;
mod copilot;
pub mod dealflow;
pub mod engine;
pub mod envelope;
pub mod errors;
pub mod knowledge;
pub mod observability;
pub mod resilience;
pub mod router;
pub mod schedule;
pub mod testing;
pub mod util;

pub use crate::copilot::{CapturedLead, Copilot, IngestionReport, KnowledgeAnswer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clients::{
        Collaborators, DocumentSource, Embedder, IndexEntry, IndexMatch, TextGenerator,
        VectorIndex,
    };
    pub use crate::config::CopilotConfig;
    pub use crate::copilot::{CapturedLead, Copilot, IngestionReport, KnowledgeAnswer};
    pub use crate::dealflow::{
        DealflowState, Lead, LeadEnrichment, ProposalCopy, ReasonCategory, StatusClassification,
        StatusLabel,
    };
    pub use crate::engine::{
        EngineFailure, Graph, GraphBuilder, GraphValidationError, Route, State, Step, Target,
    };
    pub use crate::envelope::{RequestEnvelope, RunContext};
    pub use crate::errors::{Error, RequestError};
    pub use crate::knowledge::{Citation, KnowledgeState, RetrievedChunk};
    pub use crate::resilience::{BreakerConfig, BreakerRegistry, CircuitBreaker, RetryPolicy};
    pub use crate::router::{
        select_pipeline, EntryMode, ExtractedEntities, Intent, IntentClassification, IntentRouter,
        PipelineId, PipelineSelection,
    };
    pub use crate::schedule::{MeetingSlot, SchedulingHints};
}
