//! Steps hosted by the dealflow pipeline.

use super::state::{
    DealflowField, DealflowState, Lead, LeadEnrichment, ProposalCopy, ReasonCategory,
    StatusClassification, StatusLabel,
};
use crate::clients::{TextGenerator, GENERATION_MODEL};
use crate::config::CopilotConfig;
use crate::engine::Step;
use crate::envelope::RunContext;
use crate::errors::Error;
use crate::schedule;
use crate::util::{extract_json_block, truncate_chars};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;

/// Name of the lead-extraction step.
pub const PARSE_LEAD: &str = "parse_lead";
/// Name of the lead-enrichment step.
pub const ENRICH_LEAD: &str = "enrich_lead";
/// Name of the proposal-generation step.
pub const GENERATE_PROPOSAL: &str = "generate_proposal";
/// Name of the next-step parsing step.
pub const PARSE_NEXT_STEP: &str = "parse_next_step";
/// Name of the status-classification step.
pub const CLASSIFY_STATUS: &str = "classify_status";

/// Cap applied to the proposal title.
const MAX_TITLE_CHARS: usize = 100;
/// Cap applied to the proposal summary blurb.
const MAX_BLURB_CHARS: usize = 500;
/// At most this many bullet points are kept.
const MAX_BULLETS: usize = 5;
/// Cap applied to the status reason summary.
const MAX_REASON_SUMMARY_CHARS: usize = 200;

static NAME_COMPANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][A-Za-z]+(?:\s[A-Z][A-Za-z]+)?)\s+from\s+([A-Z][A-Za-z0-9&]*(?:\s[A-Z][A-Za-z0-9&]*)*)",
    )
    .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static CORPORATE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(inc|llc|ltd|corp|corporation)\b")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?(\d[\d,]*(?:\.\d+)?\s?[km]?)\b|\bbudget\s*(?:of|is|:)?\s*(\d[\d,]*(?:\.\d+)?\s?[km]?)\b")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Extracts structured lead fields from freeform text.
///
/// The model is asked for JSON; when its output cannot be parsed (or the
/// call fails outright) the step degrades to pattern-based extraction rather
/// than failing the run.
pub struct ParseLeadStep {
    generator: Arc<dyn TextGenerator>,
}

impl ParseLeadStep {
    /// Creates the step with an injected generator.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Step<DealflowState> for ParseLeadStep {
    fn name(&self) -> &str {
        PARSE_LEAD
    }

    fn requires(&self) -> &[DealflowField] {
        &[DealflowField::RawText]
    }

    async fn run(&self, state: &mut DealflowState, ctx: &RunContext) -> Result<(), Error> {
        let prompt = format!(
            "Extract lead information from this message. Return a JSON object with \
             keys \"name\", \"company\", \"email\", \"intent\", and \"budget\"; use \
             null for anything not present.\n\nMessage: {text}\n\nJSON:",
            text = state.raw_text,
        );

        let generator = &self.generator;
        let lead = match ctx
            .guarded_call(GENERATION_MODEL, || generator.generate(&prompt))
            .await
        {
            Ok(raw) => match parse_lead_json(&raw) {
                Some(lead) if !lead.is_empty() => Some(lead),
                _ => None,
            },
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = %err,
                    "lead extraction model call failed, using pattern fallback"
                );
                None
            }
        };

        let lead = match lead {
            Some(lead) => lead,
            None => {
                state.used_fallback_extraction = true;
                extract_lead_patterns(&state.raw_text)
            }
        };

        tracing::info!(
            request_id = %ctx.request_id(),
            fallback = state.used_fallback_extraction,
            has_company = lead.company.is_some(),
            "lead parsed"
        );
        state.lead = Some(lead);
        Ok(())
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_lead_json(raw: &str) -> Option<Lead> {
    let block = extract_json_block(raw)?;
    let lead: Lead = serde_json::from_str(block).ok()?;
    Some(Lead {
        name: normalize(lead.name),
        company: normalize(lead.company),
        email: normalize(lead.email),
        intent: normalize(lead.intent),
        budget: normalize(lead.budget),
    })
}

/// Pattern-based lead extraction, used when the model yields nothing usable.
#[must_use]
pub fn extract_lead_patterns(text: &str) -> Lead {
    let (name, company) = NAME_COMPANY_RE
        .captures(text)
        .map_or((None, None), |captures| {
            (
                captures.get(1).map(|m| m.as_str().to_string()),
                captures.get(2).map(|m| m.as_str().trim().to_string()),
            )
        });

    let email = EMAIL_RE.find(text).map(|m| m.as_str().to_string());

    let budget = BUDGET_RE.captures(text).and_then(|captures| {
        if let Some(amount) = captures.get(1) {
            Some(format!("${}", amount.as_str().trim()))
        } else {
            captures.get(2).map(|m| m.as_str().trim().to_string())
        }
    });

    let lower = text.to_lowercase();
    let intent = [
        ("poc", "proof of concept"),
        ("pilot", "pilot"),
        ("demo", "demo"),
        ("proposal", "proposal"),
        ("quote", "quote"),
        ("pricing", "pricing"),
    ]
    .iter()
    .find(|(needle, _)| lower.contains(needle))
    .map(|(_, intent)| (*intent).to_string());

    Lead {
        name,
        company,
        email,
        intent,
        budget,
    }
}

/// Deterministic lead enrichment: domain guess plus completeness score.
///
/// No external calls; enrichment must stay cheap and reproducible.
pub struct EnrichLeadStep;

#[async_trait]
impl Step<DealflowState> for EnrichLeadStep {
    fn name(&self) -> &str {
        ENRICH_LEAD
    }

    fn requires(&self) -> &[DealflowField] {
        &[DealflowField::Lead]
    }

    async fn run(&self, state: &mut DealflowState, ctx: &RunContext) -> Result<(), Error> {
        let lead = state.lead.clone().unwrap_or_default();

        let domain_guess = lead
            .email
            .as_deref()
            .and_then(|email| email.split('@').nth(1))
            .map(ToString::to_string)
            .or_else(|| lead.company.as_deref().and_then(guess_company_domain));

        // Weighted completeness: company and a clear intent matter more than
        // a name or a budget figure.
        let mut quality_score: f64 = 0.0;
        if lead.name.is_some() {
            quality_score += 0.2;
        }
        if lead.company.is_some() {
            quality_score += 0.3;
        }
        if lead.intent.is_some() {
            quality_score += 0.3;
        }
        if lead.budget.is_some() {
            quality_score += 0.2;
        }
        let quality_score = quality_score.min(1.0);

        tracing::info!(
            request_id = %ctx.request_id(),
            quality_score,
            "lead enriched"
        );
        state.enrichment = Some(LeadEnrichment {
            domain_guess,
            quality_score,
        });
        Ok(())
    }
}

/// Guesses a company web domain: strip corporate suffixes, slugify, append
/// `.com`. Returns `None` when nothing of the name survives.
fn guess_company_domain(company: &str) -> Option<String> {
    let lowered = company.to_lowercase();
    let cleaned = CORPORATE_SUFFIX_RE.replace_all(&lowered, "");
    let slug: String = cleaned.chars().filter(char::is_ascii_alphanumeric).collect();
    if slug.is_empty() {
        None
    } else {
        Some(format!("{slug}.com"))
    }
}

/// Generates proposal copy for an extracted lead.
pub struct ProposalStep {
    generator: Arc<dyn TextGenerator>,
}

impl ProposalStep {
    /// Creates the step with an injected generator.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Step<DealflowState> for ProposalStep {
    fn name(&self) -> &str {
        GENERATE_PROPOSAL
    }

    fn requires(&self) -> &[DealflowField] {
        &[DealflowField::Lead]
    }

    async fn run(&self, state: &mut DealflowState, ctx: &RunContext) -> Result<(), Error> {
        let lead = state.lead.clone().unwrap_or_default();
        let audience = lead
            .company
            .clone()
            .or_else(|| lead.name.clone())
            .unwrap_or_else(|| "your team".to_string());

        let prompt = format!(
            "Write a short business proposal for {audience}.\n\
             Contact: {name}\nStated interest: {intent}\nBudget: {budget}\n\n\
             Structure the response as:\n\
             Summary: one or two sentences\n\
             Then up to five bullet points, each starting with '-'.",
            name = lead.name.as_deref().unwrap_or("unknown"),
            intent = lead.intent.as_deref().unwrap_or("not stated"),
            budget = lead.budget.as_deref().unwrap_or("not stated"),
        );

        let generator = &self.generator;
        let raw = ctx
            .guarded_call(GENERATION_MODEL, || generator.generate(&prompt))
            .await?;

        let (summary_blurb, bullet_points) = parse_proposal(&raw);
        let title = format!("Proposal for {audience}");
        state.proposal = Some(ProposalCopy {
            title: truncate_chars(&title, MAX_TITLE_CHARS).to_string(),
            summary_blurb,
            bullet_points,
        });
        Ok(())
    }
}

/// Splits generated proposal text into a summary blurb and bullet points.
/// Bullets are lines starting with `-` or `•`; everything else (minus a
/// leading `Summary:` header, if present) joins the blurb. The blurb is
/// capped at 500 characters, bullets at five.
fn parse_proposal(raw: &str) -> (String, Vec<String>) {
    let mut blurb = String::new();
    let mut bullets = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(bullet) = trimmed
            .strip_prefix('-')
            .or_else(|| trimmed.strip_prefix('\u{2022}'))
        {
            if bullets.len() < MAX_BULLETS {
                bullets.push(bullet.trim().to_string());
            }
            continue;
        }
        let body = if trimmed.to_lowercase().starts_with("summary:") {
            trimmed["summary:".len()..].trim()
        } else {
            trimmed
        };
        if !blurb.is_empty() {
            blurb.push(' ');
        }
        blurb.push_str(body);
    }

    (truncate_chars(&blurb, MAX_BLURB_CHARS).to_string(), bullets)
}

/// Resolves next-step scheduling text into a concrete slot.
pub struct NextStepParseStep {
    timezone: FixedOffset,
    require_explicit_time: bool,
}

impl NextStepParseStep {
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
impl Step<DealflowState> for NextStepParseStep {
    fn name(&self) -> &str {
        PARSE_NEXT_STEP
    }

    fn requires(&self) -> &[DealflowField] {
        &[DealflowField::RawText]
    }

    async fn run(&self, state: &mut DealflowState, ctx: &RunContext) -> Result<(), Error> {
        let hints = schedule::extract_hints(&state.raw_text);
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
            "next step parsed"
        );
        state.schedule = Some(slot);
        Ok(())
    }
}

/// Classifies a status update as won, lost, or on hold with a reason.
pub struct StatusClassifyStep {
    generator: Arc<dyn TextGenerator>,
}

impl StatusClassifyStep {
    /// Creates the step with an injected generator.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Step<DealflowState> for StatusClassifyStep {
    fn name(&self) -> &str {
        CLASSIFY_STATUS
    }

    fn requires(&self) -> &[DealflowField] {
        &[DealflowField::RawText]
    }

    async fn run(&self, state: &mut DealflowState, ctx: &RunContext) -> Result<(), Error> {
        let prompt = format!(
            "Classify this deal status update. Return a JSON object with key \
             \"status\" (one of \"won\", \"lost\", \"on_hold\") and key \"reason\" \
             (one of \"budget\", \"timeline\", \"competition\", \"internal\", \
             \"technical\", \"other\").\n\n\
             Update: {text}\n\nJSON:",
            text = state.raw_text,
        );

        let generator = &self.generator;
        let classification = match ctx
            .guarded_call(GENERATION_MODEL, || generator.generate(&prompt))
            .await
        {
            Ok(raw) => parse_status_json(&raw, &state.raw_text),
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = %err,
                    "status classification model call failed, using keyword fallback"
                );
                None
            }
        };

        let classification =
            classification.unwrap_or_else(|| classify_status_keywords(&state.raw_text));

        tracing::info!(
            request_id = %ctx.request_id(),
            label = %classification.label,
            reason = %classification.reason,
            "status classified"
        );
        state.status = Some(classification);
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct RawStatus {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

fn parse_status_json(raw: &str, update_text: &str) -> Option<StatusClassification> {
    let block = extract_json_block(raw)?;
    let parsed: RawStatus = serde_json::from_str(block).ok()?;
    let label = match parsed.status.to_lowercase().as_str() {
        "won" => StatusLabel::Won,
        "lost" => StatusLabel::Lost,
        "on_hold" | "on hold" => StatusLabel::OnHold,
        _ => return None,
    };
    let reason = match parsed.reason.as_deref().map(str::to_lowercase).as_deref() {
        Some("budget") => ReasonCategory::Budget,
        Some("timeline") => ReasonCategory::Timeline,
        Some("competition") => ReasonCategory::Competition,
        Some("internal") => ReasonCategory::Internal,
        Some("technical") => ReasonCategory::Technical,
        _ => ReasonCategory::Other,
    };
    Some(StatusClassification {
        label,
        reason,
        reason_summary: reason_summary(update_text),
    })
}

fn reason_summary(text: &str) -> String {
    truncate_chars(text.trim(), MAX_REASON_SUMMARY_CHARS).to_string()
}

/// Keyword fallback for status classification.
#[must_use]
pub fn classify_status_keywords(text: &str) -> StatusClassification {
    let lower = text.to_lowercase();

    let won = ["signed", "won", "closed the deal", "agreed", "we got it"];
    let lost = ["lost", "went with", "declined", "passed on", "no longer interested"];

    let label = if won.iter().any(|kw| lower.contains(kw)) {
        StatusLabel::Won
    } else if lost.iter().any(|kw| lower.contains(kw)) {
        StatusLabel::Lost
    } else {
        StatusLabel::OnHold
    };

    // First matching category wins; order mirrors how sales updates are
    // usually phrased.
    let categories: [(ReasonCategory, &[&str]); 5] = [
        (
            ReasonCategory::Budget,
            &["budget", "cost", "price", "money", "expensive"],
        ),
        (
            ReasonCategory::Timeline,
            &["timeline", "schedule", "deadline", "next quarter", "urgent"],
        ),
        (
            ReasonCategory::Competition,
            &["competitor", "competition", "alternative", "other vendor", "went with"],
        ),
        (
            ReasonCategory::Internal,
            &["internal", "approval", "decision", "management"],
        ),
        (
            ReasonCategory::Technical,
            &["technical", "requirement", "feature", "integration"],
        ),
    ];
    let reason = categories
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map_or(ReasonCategory::Other, |(category, _)| *category);

    StatusClassification {
        label,
        reason,
        reason_summary: reason_summary(text),
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
    async fn parse_lead_uses_model_json() {
        let generator = Arc::new(StubGenerator::always(
            r#"Here you go: {"name": "John Doe", "company": "Acme", "email": null, "intent": "proof of concept", "budget": "10k"}"#,
        ));
        let step = ParseLeadStep::new(generator);

        let mut state = DealflowState::for_text("u1", "John from Acme wants a PoC, budget 10k");
        step.run(&mut state, &ctx()).await.unwrap();

        let lead = state.lead.unwrap();
        assert_eq!(lead.name.as_deref(), Some("John Doe"));
        assert_eq!(lead.company.as_deref(), Some("Acme"));
        assert_eq!(lead.budget.as_deref(), Some("10k"));
        assert!(!state.used_fallback_extraction);
    }

    #[tokio::test]
    async fn parse_lead_falls_back_on_unparseable_output() {
        let generator = Arc::new(StubGenerator::always("I could not find any structure."));
        let step = ParseLeadStep::new(generator);

        let mut state = DealflowState::for_text(
            "u1",
            "John from Acme Corp wants a PoC, budget 10k, reach him at john@acme.io",
        );
        step.run(&mut state, &ctx()).await.unwrap();

        assert!(state.used_fallback_extraction);
        let lead = state.lead.unwrap();
        assert_eq!(lead.name.as_deref(), Some("John"));
        assert_eq!(lead.company.as_deref(), Some("Acme Corp"));
        assert_eq!(lead.email.as_deref(), Some("john@acme.io"));
        assert_eq!(lead.budget.as_deref(), Some("10k"));
        assert_eq!(lead.intent.as_deref(), Some("proof of concept"));
    }

    #[tokio::test]
    async fn parse_lead_falls_back_on_model_failure() {
        let generator = Arc::new(StubGenerator::failing());
        let step = ParseLeadStep::new(generator);

        let mut state = DealflowState::for_text("u1", "Maria from Initech asked for pricing");
        step.run(&mut state, &ctx()).await.unwrap();

        assert!(state.used_fallback_extraction);
        let lead = state.lead.unwrap();
        assert_eq!(lead.company.as_deref(), Some("Initech"));
    }

    #[test]
    fn null_and_empty_json_fields_normalize_to_none() {
        let lead = parse_lead_json(r#"{"name": "  ", "company": "null", "intent": "demo"}"#).unwrap();
        assert!(lead.name.is_none());
        assert!(lead.company.is_none());
        assert_eq!(lead.intent.as_deref(), Some("demo"));
    }

    #[test]
    fn dollar_budgets_keep_the_sign() {
        let lead = extract_lead_patterns("Ana from Globex, budget $25,000 for a pilot");
        assert_eq!(lead.budget.as_deref(), Some("$25,000"));
        assert_eq!(lead.intent.as_deref(), Some("pilot"));
    }

    #[tokio::test]
    async fn enrich_prefers_email_domain() {
        let mut state = DealflowState::for_text("u1", "x");
        state.lead = Some(Lead {
            name: Some("John".to_string()),
            company: Some("Acme Corp".to_string()),
            email: Some("john@acme.io".to_string()),
            intent: Some("poc".to_string()),
            budget: Some("10k".to_string()),
        });
        EnrichLeadStep.run(&mut state, &ctx()).await.unwrap();

        let enrichment = state.enrichment.unwrap();
        assert_eq!(enrichment.domain_guess.as_deref(), Some("acme.io"));
        assert!((enrichment.quality_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn enrich_slugifies_company_without_email() {
        let mut state = DealflowState::for_text("u1", "x");
        state.lead = Some(Lead {
            company: Some("Acme Corp".to_string()),
            ..Lead::default()
        });
        EnrichLeadStep.run(&mut state, &ctx()).await.unwrap();

        let enrichment = state.enrichment.unwrap();
        assert_eq!(enrichment.domain_guess.as_deref(), Some("acme.com"));
        assert!((enrichment.quality_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn domain_guess_strips_corporate_suffixes() {
        assert_eq!(guess_company_domain("Initech LLC").as_deref(), Some("initech.com"));
        assert_eq!(
            guess_company_domain("Globex Corporation").as_deref(),
            Some("globex.com")
        );
        assert_eq!(guess_company_domain("Inc"), None);
    }

    #[tokio::test]
    async fn quality_score_weights_company_and_intent_higher() {
        let mut state = DealflowState::for_text("u1", "x");
        state.lead = Some(Lead {
            company: Some("Acme".to_string()),
            intent: Some("demo".to_string()),
            ..Lead::default()
        });
        EnrichLeadStep.run(&mut state, &ctx()).await.unwrap();

        // company 0.3 + intent 0.3
        let enrichment = state.enrichment.unwrap();
        assert!((enrichment.quality_score - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn proposal_parses_blurb_and_bullets() {
        let generator = Arc::new(StubGenerator::always(
            "Summary: We will deliver a proof of concept.\n\
             - Two-week integration\n\
             \u{2022} Dedicated support channel\n\
             - Fixed price of $10,000",
        ));
        let step = ProposalStep::new(generator);

        let mut state = DealflowState::for_text("u1", "x");
        state.lead = Some(Lead {
            company: Some("Acme".to_string()),
            ..Lead::default()
        });
        step.run(&mut state, &ctx()).await.unwrap();

        let proposal = state.proposal.unwrap();
        assert_eq!(proposal.title, "Proposal for Acme");
        assert_eq!(proposal.summary_blurb, "We will deliver a proof of concept.");
        assert_eq!(
            proposal.bullet_points,
            vec![
                "Two-week integration",
                "Dedicated support channel",
                "Fixed price of $10,000",
            ]
        );
    }

    #[tokio::test]
    async fn headerless_proposal_lands_in_blurb() {
        let generator = Arc::new(StubGenerator::always("Just one unstructured paragraph."));
        let step = ProposalStep::new(generator);

        let mut state = DealflowState::for_text("u1", "x");
        state.lead = Some(Lead {
            name: Some("Maria".to_string()),
            ..Lead::default()
        });
        step.run(&mut state, &ctx()).await.unwrap();

        let proposal = state.proposal.unwrap();
        assert_eq!(proposal.title, "Proposal for Maria");
        assert_eq!(proposal.summary_blurb, "Just one unstructured paragraph.");
        assert!(proposal.bullet_points.is_empty());
    }

    #[test]
    fn proposal_caps_blurb_and_bullet_counts() {
        let raw = format!(
            "Summary: {}\n- one\n- two\n- three\n- four\n- five\n- six",
            "x".repeat(600)
        );
        let (blurb, bullets) = parse_proposal(&raw);
        assert_eq!(blurb.chars().count(), 500);
        assert_eq!(bullets.len(), 5);
    }

    #[tokio::test]
    async fn next_step_resolves_a_slot() {
        let step = NextStepParseStep::new(&CopilotConfig::default());
        let mut state = DealflowState::for_text("u1", "let's meet tomorrow at 2pm to sign");
        step.run(&mut state, &ctx()).await.unwrap();

        let slot = state.schedule.unwrap();
        assert_eq!(slot.start.time().to_string(), "14:00:00");
    }

    #[tokio::test]
    async fn status_classification_uses_model_json() {
        let generator = Arc::new(StubGenerator::always(
            r#"{"status": "lost", "reason": "competition"}"#,
        ));
        let step = StatusClassifyStep::new(generator);

        let mut state = DealflowState::for_text("u1", "they went with another vendor");
        step.run(&mut state, &ctx()).await.unwrap();

        let status = state.status.unwrap();
        assert_eq!(status.label, StatusLabel::Lost);
        assert_eq!(status.reason, ReasonCategory::Competition);
        assert_eq!(status.reason_summary, "they went with another vendor");
    }

    #[tokio::test]
    async fn status_classification_falls_back_to_keywords() {
        let generator = Arc::new(StubGenerator::always("not json at all"));
        let step = StatusClassifyStep::new(generator);

        let mut state =
            DealflowState::for_text("u1", "they passed on us, said we were too expensive");
        step.run(&mut state, &ctx()).await.unwrap();

        let status = state.status.unwrap();
        assert_eq!(status.label, StatusLabel::Lost);
        assert_eq!(status.reason, ReasonCategory::Budget);
    }

    #[test]
    fn keyword_fallback_defaults_to_on_hold_other() {
        let status = classify_status_keywords("no news yet");
        assert_eq!(status.label, StatusLabel::OnHold);
        assert_eq!(status.reason, ReasonCategory::Other);
        assert_eq!(status.reason_summary, "no news yet");
    }

    #[test]
    fn keyword_fallback_covers_internal_and_technical() {
        let internal = classify_status_keywords("waiting on management approval");
        assert_eq!(internal.label, StatusLabel::OnHold);
        assert_eq!(internal.reason, ReasonCategory::Internal);

        let technical = classify_status_keywords("blocked on an integration requirement");
        assert_eq!(technical.reason, ReasonCategory::Technical);
    }

    #[test]
    fn reason_summary_keeps_the_first_200_chars() {
        let status = classify_status_keywords(&"update ".repeat(50));
        assert_eq!(status.reason_summary.chars().count(), 200);
    }
}
