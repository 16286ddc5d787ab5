//! Scheduling-hint extraction and deterministic time resolution.
//!
//! Both agents share this: the knowledge pipeline's reflection step scans
//! queries for follow-up scheduling, and the dealflow pipeline parses
//! next-step text directly. Resolution is total by default: when no explicit
//! day or time can be parsed, the slot falls back to tomorrow at 10:00 in
//! the configured time zone for a one-hour block. That fallback is policy,
//! not a guess engine, and strict mode is available for callers that demand
//! an explicit time.

use crate::errors::Error;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Keywords whose presence in a query marks scheduling intent
/// (case-insensitive substring match).
pub const SCHEDULING_KEYWORDS: &[&str] = &[
    "schedule",
    "meeting",
    "call",
    "appointment",
    "book",
    "arrange",
    "calendar",
];

static DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|today)\b")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Requires either minutes or an am/pm marker so bare numbers
    // ("budget 10k") never read as a time of day.
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b|\b(\d{1,2})\s*(am|pm)\b")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static WITH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwith\s+([A-Za-z][A-Za-z\s]*?)(?:\s+(?:about|regarding)\b|[.,!?]|$)")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static ABOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\babout\s+([A-Za-z0-9][A-Za-z0-9\s]*?)(?:[.,!?]|$)")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static KIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(demo|call|meeting|presentation|review)\b")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Returns whether the text mentions scheduling at all.
#[must_use]
pub fn mentions_scheduling(text: &str) -> bool {
    let lower = text.to_lowercase();
    SCHEDULING_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Coarse scheduling hints pattern-matched out of free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingHints {
    /// Day name, "today", or "tomorrow".
    pub day: Option<String>,
    /// Raw matched time text (e.g. "3pm", "11:30").
    pub time: Option<String>,
    /// The "with <name>" clause, if present.
    pub with_person: Option<String>,
    /// The "about <topic>" clause, if present.
    pub topic: Option<String>,
    /// Meeting kind keyword (demo, call, meeting, presentation, review).
    pub meeting_kind: Option<String>,
}

impl SchedulingHints {
    /// Whether no hint was found at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.day.is_none()
            && self.time.is_none()
            && self.with_person.is_none()
            && self.topic.is_none()
            && self.meeting_kind.is_none()
    }
}

/// Extracts scheduling hints from free text.
#[must_use]
pub fn extract_hints(text: &str) -> SchedulingHints {
    SchedulingHints {
        day: DAY_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase()),
        time: TIME_RE.find(text).map(|m| m.as_str().trim().to_string()),
        with_person: WITH_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string()),
        topic: ABOUT_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string()),
        meeting_kind: KIND_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase()),
    }
}

/// A resolved calendar slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSlot {
    /// Slot title.
    pub title: String,
    /// Start of the slot.
    pub start: DateTime<FixedOffset>,
    /// End of the slot, one hour after start.
    pub end: DateTime<FixedOffset>,
    /// Attendee names extracted from the text.
    pub attendees: Vec<String>,
}

/// Resolves hints into a concrete slot relative to `now`.
///
/// Date policy: an explicit day wins (weekday names resolve to the next
/// occurrence strictly after today); otherwise the slot lands tomorrow.
/// Time policy: an explicit time wins; otherwise 10:00. The block is one
/// hour long.
#[must_use]
pub fn resolve(hints: &SchedulingHints, now: DateTime<FixedOffset>) -> MeetingSlot {
    let date = match hints.day.as_deref() {
        Some("today") => now.date_naive(),
        Some("tomorrow") | None => now.date_naive() + ChronoDuration::days(1),
        Some(day) => match parse_weekday(day) {
            Some(target) => {
                let mut date = now.date_naive() + ChronoDuration::days(1);
                while date.weekday() != target {
                    date += ChronoDuration::days(1);
                }
                date
            }
            None => now.date_naive() + ChronoDuration::days(1),
        },
    };

    let (hour, minute) = hints
        .time
        .as_deref()
        .and_then(parse_time)
        .unwrap_or((10, 0));

    let start = date
        .and_hms_opt(hour, minute, 0)
        .and_then(|naive| naive.and_local_timezone(now.timezone()).single())
        .unwrap_or_else(|| now + ChronoDuration::days(1));
    let end = start + ChronoDuration::hours(1);

    MeetingSlot {
        title: slot_title(hints),
        start,
        end,
        attendees: hints.with_person.iter().cloned().collect(),
    }
}

/// Like [`resolve`], but fails when the caller demands an explicit time and
/// neither a day nor a time hint was found.
pub fn resolve_strict(
    hints: &SchedulingHints,
    now: DateTime<FixedOffset>,
) -> Result<MeetingSlot, Error> {
    if hints.day.is_none() && hints.time.is_none() {
        return Err(Error::SchedulingParse {
            reason: "no explicit day or time found and the fallback is disabled".to_string(),
        });
    }
    Ok(resolve(hints, now))
}

fn slot_title(hints: &SchedulingHints) -> String {
    let base = match hints.meeting_kind.as_deref() {
        Some(kind) => format!("Business {kind}"),
        None => "Follow-up meeting".to_string(),
    };
    match hints.topic.as_deref() {
        Some(topic) => format!("{base}: {topic}"),
        None => base,
    }
}

fn parse_weekday(day: &str) -> Option<Weekday> {
    match day {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_time(raw: &str) -> Option<(u32, u32)> {
    let captures = TIME_RE.captures(raw)?;
    let (hour_str, minute_str, meridiem) = if captures.get(1).is_some() {
        (
            captures.get(1)?.as_str(),
            captures.get(2).map_or("0", |m| m.as_str()),
            captures.get(3).map(|m| m.as_str().to_lowercase()),
        )
    } else {
        (
            captures.get(4)?.as_str(),
            "0",
            captures.get(5).map(|m| m.as_str().to_lowercase()),
        )
    };

    let mut hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    match meridiem.as_deref() {
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    /// A Tuesday.
    fn fixed_now() -> DateTime<FixedOffset> {
        utc().with_ymd_and_hms(2024, 5, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn keyword_scan_is_case_insensitive() {
        assert!(mentions_scheduling("Please SCHEDULE a demo"));
        assert!(mentions_scheduling("put it on my calendar"));
        assert!(!mentions_scheduling("what is the refund policy?"));
    }

    #[test]
    fn extracts_day_time_person_and_topic() {
        let hints =
            extract_hints("Schedule a demo with Maria Lopez about pricing on Friday at 3pm");
        assert_eq!(hints.day.as_deref(), Some("friday"));
        assert_eq!(hints.time.as_deref(), Some("3pm"));
        assert_eq!(hints.with_person.as_deref(), Some("Maria Lopez"));
        assert_eq!(hints.topic.as_deref(), Some("pricing on Friday at 3pm"));
        assert_eq!(hints.meeting_kind.as_deref(), Some("demo"));
    }

    #[test]
    fn bare_numbers_are_not_times() {
        let hints = extract_hints("John from Acme wants a PoC, budget 10k");
        assert!(hints.time.is_none());
    }

    #[test]
    fn fallback_is_tomorrow_at_ten_for_one_hour() {
        let slot = resolve(&SchedulingHints::default(), fixed_now());
        assert_eq!(
            slot.start,
            utc().with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap()
        );
        assert_eq!(slot.end - slot.start, ChronoDuration::hours(1));
        assert_eq!(slot.title, "Follow-up meeting");
        assert!(slot.attendees.is_empty());
    }

    #[test]
    fn fallback_is_deterministic() {
        let a = resolve(&SchedulingHints::default(), fixed_now());
        let b = resolve(&SchedulingHints::default(), fixed_now());
        assert_eq!(a, b);
    }

    #[test]
    fn weekday_resolves_to_next_occurrence() {
        let hints = extract_hints("book a review on friday at 11:30");
        let slot = resolve(&hints, fixed_now());
        // 2024-05-14 is a Tuesday; next Friday is the 17th.
        assert_eq!(
            slot.start,
            utc().with_ymd_and_hms(2024, 5, 17, 11, 30, 0).unwrap()
        );
        assert_eq!(slot.title, "Business review");
    }

    #[test]
    fn same_weekday_means_next_week() {
        let hints = extract_hints("meeting on tuesday");
        let slot = resolve(&hints, fixed_now());
        assert_eq!(
            slot.start,
            utc().with_ymd_and_hms(2024, 5, 21, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn pm_times_convert_to_24h() {
        assert_eq!(parse_time("3pm"), Some((15, 0)));
        assert_eq!(parse_time("12pm"), Some((12, 0)));
        assert_eq!(parse_time("12am"), Some((0, 0)));
        assert_eq!(parse_time("11:45 am"), Some((11, 45)));
        assert_eq!(parse_time("15:00"), Some((15, 0)));
    }

    #[test]
    fn today_stays_today() {
        let hints = extract_hints("call today at 4pm");
        let slot = resolve(&hints, fixed_now());
        assert_eq!(
            slot.start,
            utc().with_ymd_and_hms(2024, 5, 14, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn strict_mode_rejects_hintless_text() {
        let hints = extract_hints("no scheduling information here at all");
        let err = resolve_strict(&hints, fixed_now()).unwrap_err();
        assert!(matches!(err, Error::SchedulingParse { .. }));
    }

    #[test]
    fn strict_mode_accepts_explicit_day() {
        let hints = extract_hints("see you tomorrow");
        assert!(resolve_strict(&hints, fixed_now()).is_ok());
    }
}
