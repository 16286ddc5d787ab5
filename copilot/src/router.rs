//! Intent classification and pipeline selection for inbound messages.

use crate::clients::{TextGenerator, GENERATION_MODEL};
use crate::dealflow::{self, extract_lead_patterns};
use crate::envelope::RunContext;
use crate::knowledge;
use crate::schedule;
use crate::util::extract_json_block;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The closed set of intents an inbound message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// A question to answer from ingested knowledge (or a document to
    /// ingest, when the message carries an attachment).
    KnowledgeQa,
    /// A new lead to capture.
    LeadCapture,
    /// A request for proposal copy.
    ProposalRequest,
    /// A next step to schedule.
    NextStep,
    /// A deal status update.
    StatusUpdate,
    /// Chatter with no actionable content.
    Smalltalk,
    /// Nothing recognizable.
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KnowledgeQa => "knowledge_qa",
            Self::LeadCapture => "lead_capture",
            Self::ProposalRequest => "proposal_request",
            Self::NextStep => "next_step",
            Self::StatusUpdate => "status_update",
            Self::Smalltalk => "smalltalk",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Entities pattern-matched out of the message alongside the intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    /// Person names mentioned.
    #[serde(default)]
    pub names: Vec<String>,
    /// Company or organization names mentioned.
    #[serde(default)]
    pub organizations: Vec<String>,
    /// Date or time mentions.
    #[serde(default)]
    pub dates_times: Vec<String>,
    /// Budget or money amounts.
    #[serde(default)]
    pub budget_amounts: Vec<String>,
    /// Emails and other contact details.
    #[serde(default)]
    pub contact_info: Vec<String>,
}

impl ExtractedEntities {
    /// Whether nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
            && self.organizations.is_empty()
            && self.dates_times.is_empty()
            && self.budget_amounts.is_empty()
            && self.contact_info.is_empty()
    }
}

/// One classification outcome. Produced once per inbound message, never
/// mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    /// The classified intent.
    pub intent: Intent,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Entities found in the message.
    pub entities: ExtractedEntities,
    /// Why this verdict was reached, populated on degraded paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// The pipelines a message can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineId {
    /// The knowledge pipeline.
    Knowledge,
    /// The dealflow pipeline.
    Dealflow,
}

/// How the selected pipeline should be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Execute the full graph from its entry step.
    FullGraph,
    /// Execute exactly one named step.
    SingleStep(&'static str),
}

/// A routing decision: which pipeline, entered how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSelection {
    /// The pipeline to run.
    pub pipeline: PipelineId,
    /// The entry mode.
    pub entry: EntryMode,
}

/// Maps a classification onto a pipeline and entry mode.
///
/// An attachment always means "ingest this document" no matter what the
/// intent says. Smalltalk and unknown messages default to the knowledge
/// pipeline, whose no-information answer is a safer outcome than silently
/// dropping the message.
#[must_use]
pub fn select_pipeline(
    classification: &IntentClassification,
    has_attachments: bool,
) -> PipelineSelection {
    if has_attachments {
        return PipelineSelection {
            pipeline: PipelineId::Knowledge,
            entry: EntryMode::SingleStep(knowledge::INGEST),
        };
    }
    let (pipeline, entry) = match classification.intent {
        Intent::KnowledgeQa | Intent::Smalltalk | Intent::Unknown => {
            (PipelineId::Knowledge, EntryMode::FullGraph)
        }
        Intent::LeadCapture => (PipelineId::Dealflow, EntryMode::FullGraph),
        Intent::ProposalRequest => (
            PipelineId::Dealflow,
            EntryMode::SingleStep(dealflow::GENERATE_PROPOSAL),
        ),
        Intent::NextStep => (
            PipelineId::Dealflow,
            EntryMode::SingleStep(dealflow::PARSE_NEXT_STEP),
        ),
        Intent::StatusUpdate => (
            PipelineId::Dealflow,
            EntryMode::SingleStep(dealflow::CLASSIFY_STATUS),
        ),
    };
    PipelineSelection { pipeline, entry }
}

/// Classifies inbound messages.
///
/// Attachments short-circuit to `knowledge_qa` at fixed confidence without
/// consulting the model at all. Otherwise the model is asked for a JSON
/// verdict over the closed intent set. Classification never fails: a model
/// failure or unparsable output degrades to `unknown` at low confidence
/// with the reason recorded.
pub struct IntentRouter {
    generator: Arc<dyn TextGenerator>,
}

impl IntentRouter {
    /// Creates a router with an injected generator.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Classifies one message.
    pub async fn classify(
        &self,
        text: &str,
        has_attachments: bool,
        prior_context: Option<&str>,
        ctx: &RunContext,
    ) -> IntentClassification {
        if has_attachments {
            return IntentClassification {
                intent: Intent::KnowledgeQa,
                confidence: 0.9,
                entities: ExtractedEntities::default(),
                reasoning: None,
            };
        }

        let context_block = prior_context
            .map(|prior| format!("Prior context: {prior}\n\n"))
            .unwrap_or_default();
        let prompt = format!(
            "Classify this message's intent. Return a JSON object with key \
             \"intent\" (one of \"knowledge_qa\", \"lead_capture\", \
             \"proposal_request\", \"next_step\", \"status_update\", \
             \"smalltalk\", \"unknown\") and key \"confidence\" (0 to 1).\n\n\
             {context_block}Message: {text}\n\nJSON:",
        );

        let generator = &self.generator;
        let classification = match ctx
            .guarded_call(GENERATION_MODEL, || generator.generate(&prompt))
            .await
        {
            Ok(raw) => match parse_intent_json(&raw) {
                Some((intent, confidence)) => IntentClassification {
                    intent,
                    confidence,
                    entities: extract_entities(text),
                    reasoning: None,
                },
                None => degraded("classifier output was not parsable", text),
            },
            Err(err) => degraded(&format!("classifier call failed: {err}"), text),
        };

        tracing::info!(
            request_id = %ctx.request_id(),
            intent = %classification.intent,
            confidence = classification.confidence,
            "intent classified"
        );
        classification
    }
}

/// The degraded verdict: never an error, always usable.
fn degraded(reason: &str, text: &str) -> IntentClassification {
    IntentClassification {
        intent: Intent::Unknown,
        confidence: 0.1,
        entities: extract_entities(text),
        reasoning: Some(reason.to_string()),
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    intent: String,
    #[serde(default)]
    confidence: Option<f64>,
}

fn parse_intent_json(raw: &str) -> Option<(Intent, f64)> {
    let block = extract_json_block(raw)?;
    let verdict: RawVerdict = serde_json::from_str(block).ok()?;
    let intent = match verdict.intent.to_lowercase().as_str() {
        "knowledge_qa" => Intent::KnowledgeQa,
        "lead_capture" => Intent::LeadCapture,
        "proposal_request" => Intent::ProposalRequest,
        "next_step" => Intent::NextStep,
        "status_update" => Intent::StatusUpdate,
        "smalltalk" => Intent::Smalltalk,
        "unknown" => Intent::Unknown,
        _ => return None,
    };
    let confidence = verdict.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
    Some((intent, confidence))
}

fn extract_entities(text: &str) -> ExtractedEntities {
    let lead = extract_lead_patterns(text);
    let hints = schedule::extract_hints(text);

    let mut names: Vec<String> = lead.name.into_iter().collect();
    if let Some(person) = hints.with_person {
        if !names.contains(&person) {
            names.push(person);
        }
    }

    ExtractedEntities {
        names,
        organizations: lead.company.into_iter().collect(),
        dates_times: hints.day.into_iter().chain(hints.time).collect(),
        budget_amounts: lead.budget.into_iter().collect(),
        contact_info: lead.email.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{BreakerRegistry, RetryPolicy};
    use crate::testing::StubGenerator;
    use pretty_assertions::assert_eq;

    fn ctx() -> RunContext {
        RunContext::new(Arc::new(BreakerRegistry::default()), RetryPolicy::default())
    }

    #[tokio::test]
    async fn attachment_short_circuits_without_a_model_call() {
        let generator = Arc::new(StubGenerator::always("unused"));
        let router = IntentRouter::new(generator.clone());

        let result = router
            .classify("John from Acme sent our brochure", true, None, &ctx())
            .await;

        assert_eq!(result.intent, Intent::KnowledgeQa);
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert!(result.entities.is_empty());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn model_verdict_is_used_when_parseable() {
        let generator = Arc::new(StubGenerator::always(
            r#"{"intent": "lead_capture", "confidence": 0.92}"#,
        ));
        let router = IntentRouter::new(generator);

        let result = router
            .classify("John from Acme wants a PoC, budget 10k", false, None, &ctx())
            .await;

        assert_eq!(result.intent, Intent::LeadCapture);
        assert!((result.confidence - 0.92).abs() < 1e-9);
        assert!(result.reasoning.is_none());
        assert_eq!(result.entities.organizations, vec!["Acme"]);
        assert_eq!(result.entities.names, vec!["John"]);
        assert_eq!(result.entities.budget_amounts, vec!["10k"]);
    }

    #[test]
    fn entities_cover_times_budgets_and_contact_info() {
        let entities = extract_entities(
            "Ana from Globex, budget $25,000, reach her at ana@globex.com, call friday 2pm",
        );

        assert_eq!(entities.names, vec!["Ana"]);
        assert_eq!(entities.organizations, vec!["Globex"]);
        assert_eq!(entities.dates_times, vec!["friday", "2pm"]);
        assert_eq!(entities.budget_amounts, vec!["$25,000"]);
        assert_eq!(entities.contact_info, vec!["ana@globex.com"]);
    }

    #[tokio::test]
    async fn prior_context_is_included_in_the_prompt() {
        let generator = Arc::new(StubGenerator::always(
            r#"{"intent": "next_step", "confidence": 0.8}"#,
        ));
        let router = IntentRouter::new(generator.clone());

        let _ = router
            .classify("yes, tomorrow works", false, Some("proposed a demo"), &ctx())
            .await;

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.contains("Prior context: proposed a demo"));
    }

    #[tokio::test]
    async fn unparseable_output_degrades_to_unknown() {
        let generator = Arc::new(StubGenerator::always("no json here"));
        let router = IntentRouter::new(generator);

        let result = router
            .classify("What is the refund policy?", false, None, &ctx())
            .await;

        assert_eq!(result.intent, Intent::Unknown);
        assert!((result.confidence - 0.1).abs() < 1e-9);
        assert!(result.reasoning.unwrap().contains("not parsable"));
    }

    #[tokio::test]
    async fn model_failure_degrades_to_unknown() {
        let generator = Arc::new(StubGenerator::failing());
        let router = IntentRouter::new(generator);

        let result = router
            .classify("they went with a competitor", false, None, &ctx())
            .await;

        assert_eq!(result.intent, Intent::Unknown);
        assert!((result.confidence - 0.1).abs() < 1e-9);
        assert!(result.reasoning.unwrap().contains("call failed"));
    }

    #[tokio::test]
    async fn out_of_set_intent_degrades_to_unknown() {
        let generator = Arc::new(StubGenerator::always(
            r#"{"intent": "world_domination", "confidence": 0.99}"#,
        ));
        let router = IntentRouter::new(generator);

        let result = router.classify("hello", false, None, &ctx()).await;

        assert_eq!(result.intent, Intent::Unknown);
        assert!((result.confidence - 0.1).abs() < 1e-9);
    }

    fn verdict(intent: Intent) -> IntentClassification {
        IntentClassification {
            intent,
            confidence: 0.9,
            entities: ExtractedEntities::default(),
            reasoning: None,
        }
    }

    #[test]
    fn attachments_always_select_ingestion() {
        let selection = select_pipeline(&verdict(Intent::LeadCapture), true);
        assert_eq!(selection.pipeline, PipelineId::Knowledge);
        assert_eq!(selection.entry, EntryMode::SingleStep(knowledge::INGEST));
    }

    #[test]
    fn selection_covers_every_intent() {
        assert_eq!(
            select_pipeline(&verdict(Intent::KnowledgeQa), false),
            PipelineSelection {
                pipeline: PipelineId::Knowledge,
                entry: EntryMode::FullGraph
            }
        );
        assert_eq!(
            select_pipeline(&verdict(Intent::ProposalRequest), false).entry,
            EntryMode::SingleStep(dealflow::GENERATE_PROPOSAL)
        );
        assert_eq!(
            select_pipeline(&verdict(Intent::NextStep), false).entry,
            EntryMode::SingleStep(dealflow::PARSE_NEXT_STEP)
        );
        assert_eq!(
            select_pipeline(&verdict(Intent::StatusUpdate), false).entry,
            EntryMode::SingleStep(dealflow::CLASSIFY_STATUS)
        );
        assert_eq!(
            select_pipeline(&verdict(Intent::LeadCapture), false).pipeline,
            PipelineId::Dealflow
        );
        // Smalltalk and unknown default to answering from knowledge.
        assert_eq!(
            select_pipeline(&verdict(Intent::Smalltalk), false).pipeline,
            PipelineId::Knowledge
        );
        assert_eq!(
            select_pipeline(&verdict(Intent::Unknown), false).pipeline,
            PipelineId::Knowledge
        );
    }
}
