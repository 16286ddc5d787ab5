//! Typed state for dealflow pipeline runs.

use crate::engine::State;
use crate::schedule::MeetingSlot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured lead fields pulled out of freeform text.
///
/// Every field is optional: extraction is best-effort and downstream steps
/// must cope with partial leads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    /// Contact name.
    #[serde(default)]
    pub name: Option<String>,
    /// Company name.
    #[serde(default)]
    pub company: Option<String>,
    /// Contact email address.
    #[serde(default)]
    pub email: Option<String>,
    /// What the lead wants.
    #[serde(default)]
    pub intent: Option<String>,
    /// Budget text as written (e.g. "10k", "$25,000").
    #[serde(default)]
    pub budget: Option<String>,
}

impl Lead {
    /// Whether any field was extracted at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.company.is_none()
            && self.email.is_none()
            && self.intent.is_none()
            && self.budget.is_none()
    }
}

/// Deterministic enrichment derived from an extracted lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEnrichment {
    /// Guessed company web domain, when a company name is present.
    pub domain_guess: Option<String>,
    /// Completeness score in `[0, 1]`, one quarter per populated core field.
    pub quality_score: f64,
}

/// Proposal copy assembled from generated text: a title, a short blurb, and
/// up to five bullet points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCopy {
    /// Proposal title, at most 100 characters.
    pub title: String,
    /// Executive summary, at most 500 characters.
    pub summary_blurb: String,
    /// Key points, at most five.
    pub bullet_points: Vec<String>,
}

/// Deal status labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    /// The deal closed successfully.
    Won,
    /// The deal was lost.
    Lost,
    /// No terminal outcome yet.
    OnHold,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Won => "won",
            Self::Lost => "lost",
            Self::OnHold => "on_hold",
        };
        f.write_str(name)
    }
}

/// Why a deal landed where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCategory {
    /// Budget or price objection.
    Budget,
    /// Timeline or scheduling pressure.
    Timeline,
    /// Lost to a competitor or alternative.
    Competition,
    /// Internal approval or decision process.
    Internal,
    /// Technical requirements or integration.
    Technical,
    /// No recognizable reason in the text.
    Other,
}

impl fmt::Display for ReasonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Budget => "budget",
            Self::Timeline => "timeline",
            Self::Competition => "competition",
            Self::Internal => "internal",
            Self::Technical => "technical",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A classified status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusClassification {
    /// The status label.
    pub label: StatusLabel,
    /// The reason category.
    pub reason: ReasonCategory,
    /// The first 200 characters of the update text, kept as evidence.
    pub reason_summary: String,
}

/// Fields of [`DealflowState`] that steps may declare as requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealflowField {
    /// The raw inbound message text.
    RawText,
    /// The extracted lead.
    Lead,
    /// Lead enrichment output.
    Enrichment,
    /// Generated proposal copy.
    Proposal,
    /// Resolved next-step slot.
    Schedule,
    /// Classified deal status.
    Status,
}

impl fmt::Display for DealflowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RawText => "raw_text",
            Self::Lead => "lead",
            Self::Enrichment => "enrichment",
            Self::Proposal => "proposal",
            Self::Schedule => "schedule",
            Self::Status => "status",
        };
        f.write_str(name)
    }
}

/// Mutable state threaded through one dealflow pipeline run.
#[derive(Debug, Clone, Default)]
pub struct DealflowState {
    /// Requesting user, for logging only.
    pub user_id: String,
    /// The raw inbound text the run operates on.
    pub raw_text: String,
    /// Extracted lead fields.
    pub lead: Option<Lead>,
    /// Whether lead extraction fell back to pattern matching.
    pub used_fallback_extraction: bool,
    /// Enrichment output.
    pub enrichment: Option<LeadEnrichment>,
    /// Generated proposal.
    pub proposal: Option<ProposalCopy>,
    /// Resolved next-step slot.
    pub schedule: Option<MeetingSlot>,
    /// Classified status update.
    pub status: Option<StatusClassification>,
}

impl DealflowState {
    /// Seeds state for a run over raw inbound text.
    #[must_use]
    pub fn for_text(user_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            raw_text: raw_text.into(),
            ..Self::default()
        }
    }
}

impl State for DealflowState {
    type Field = DealflowField;

    fn contains(&self, field: DealflowField) -> bool {
        match field {
            DealflowField::RawText => !self.raw_text.trim().is_empty(),
            // A lead with no populated field is not usable downstream.
            DealflowField::Lead => self.lead.as_ref().is_some_and(|lead| !lead.is_empty()),
            DealflowField::Enrichment => self.enrichment.is_some(),
            DealflowField::Proposal => self.proposal.is_some(),
            DealflowField::Schedule => self.schedule.is_some(),
            DealflowField::Status => self.status.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lead_does_not_satisfy_the_lead_field() {
        let mut state = DealflowState::for_text("u1", "hello");
        assert!(!state.contains(DealflowField::Lead));
        state.lead = Some(Lead::default());
        assert!(!state.contains(DealflowField::Lead));
        state.lead = Some(Lead {
            company: Some("Acme".to_string()),
            ..Lead::default()
        });
        assert!(state.contains(DealflowField::Lead));
    }

    #[test]
    fn whitespace_raw_text_does_not_count() {
        let state = DealflowState::for_text("u1", "  \n ");
        assert!(!state.contains(DealflowField::RawText));
    }

    #[test]
    fn status_labels_serialize_snake_case() {
        let json = serde_json::to_string(&StatusLabel::OnHold).unwrap();
        assert_eq!(json, "\"on_hold\"");
        let reason: ReasonCategory = serde_json::from_str("\"competition\"").unwrap();
        assert_eq!(reason, ReasonCategory::Competition);
    }
}
