//! Failure event types for setback.
//!
//! A `FailureEvent` is an immutable, validated record of something that went
//! wrong (or nearly did). Events are created from an `EventDraft` through
//! `EventDraft::validate`, which is the only way past the boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SetbackError};

/// Schema version for serialized events.
pub const EVENT_SCHEMA_VERSION: u8 = 1;

/// Maximum number of entries in a cause chain.
pub const MAX_CAUSE_CHAIN: usize = 5;

/// Inclusive impact scale.
pub const IMPACT_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Prefix of every generated event id.
pub const EVENT_ID_PREFIX: &str = "loss";

/// A validated failure/risk event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureEvent {
    /// Unique identifier (format: loss_YYYYMMDD_NNN).
    pub id: String,
    /// Schema version for forward compatibility.
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
    /// Free text naming the originating task or scenario.
    pub source_ref: String,
    /// Broad failure category.
    pub category: FailureCategory,
    /// Failure archetypes, in the order they were given. Never empty.
    pub archetypes: Vec<String>,
    /// Impact on a 1-5 scale.
    pub impact: u8,
    /// Topic references.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Energy level at the time of failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<EnergyLevel>,
    /// Emotional state at the time of failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<String>,
    /// Ordered chain of causes, 1-5 entries.
    pub cause_chain: Vec<String>,
    /// Principle that would have prevented the failure.
    pub mitigation_principle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_factual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_test_ref: Option<String>,
    /// When the failure happened.
    pub timestamp: DateTime<Utc>,
    /// Where the event came from.
    pub provenance: Provenance,
    /// Moment the failure was recognized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realization_point: Option<String>,
}

fn default_schema_version() -> u8 {
    EVENT_SCHEMA_VERSION
}

impl FailureEvent {
    /// Whether the event lists the given archetype.
    pub fn has_archetype(&self, archetype: &str) -> bool {
        self.archetypes.iter().any(|a| a == archetype)
    }

    /// The task reference whose deferral counter this event resolves.
    ///
    /// Falls back to `source_ref` when provenance carries no task reference.
    pub fn task_ref(&self) -> &str {
        self.provenance
            .source_task_ref
            .as_deref()
            .unwrap_or(&self.source_ref)
    }

    /// Calendar date of the event in UTC.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Broad failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Did not know something required.
    KnowledgeGap,
    /// Knew it, but could not execute it.
    SkillGap,
    /// Knew and could, but the process broke down.
    ProcessFailure,
}

impl FailureCategory {
    /// All category variants.
    pub fn all() -> &'static [FailureCategory] {
        &[
            FailureCategory::KnowledgeGap,
            FailureCategory::SkillGap,
            FailureCategory::ProcessFailure,
        ]
    }

    /// Stable identifier used in metadata and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeGap => "knowledge_gap",
            Self::SkillGap => "skill_gap",
            Self::ProcessFailure => "process_failure",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Energy level reported with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

impl EnergyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// How an event entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Logged by hand.
    #[default]
    Manual,
    /// Logged in response to an escalation prompt.
    Proactive,
    /// Logged through the quick-capture path.
    Quick,
}

/// Provenance of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub origin: Origin,
    /// Opaque task id or document path the event was logged from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_ref: Option<String>,
}

/// A partially-filled event, as submitted by a caller or queued for later.
///
/// Every field is optional so that a pending context can be stored before
/// the reflection is complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDraft {
    pub source_ref: Option<String>,
    pub category: Option<FailureCategory>,
    pub archetypes: Vec<String>,
    pub impact: Option<u8>,
    pub topics: Vec<String>,
    pub tags: Vec<String>,
    pub energy_level: Option<EnergyLevel>,
    pub emotional_state: Option<String>,
    pub cause_chain: Vec<String>,
    pub mitigation_principle: Option<String>,
    pub counter_factual: Option<String>,
    pub evidence_ref: Option<String>,
    pub linked_test_ref: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub origin: Option<Origin>,
    pub source_task_ref: Option<String>,
    pub realization_point: Option<String>,
}

impl EventDraft {
    /// Create a draft for the given source reference.
    pub fn new(source_ref: impl Into<String>) -> Self {
        Self {
            source_ref: Some(source_ref.into()),
            ..Self::default()
        }
    }

    /// Validate the draft and build an event with the given id.
    ///
    /// `now` is used when the draft carries no timestamp.
    ///
    /// # Errors
    ///
    /// Returns `SetbackError::Validation` naming the first missing or
    /// out-of-range field.
    pub fn validate(self, id: impl Into<String>, now: DateTime<Utc>) -> Result<FailureEvent> {
        let source_ref = non_empty(self.source_ref, "source_ref")?;
        let mitigation_principle = non_empty(self.mitigation_principle, "mitigation_principle")?;

        let archetypes = dedup_preserving_order(
            self.archetypes
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
        );
        if archetypes.is_empty() {
            return Err(SetbackError::validation("archetypes must not be empty"));
        }

        let category = self
            .category
            .ok_or_else(|| SetbackError::validation("category is required"))?;

        let impact = self
            .impact
            .ok_or_else(|| SetbackError::validation("impact is required"))?;
        if !IMPACT_RANGE.contains(&impact) {
            return Err(SetbackError::validation(format!(
                "impact must be between 1 and 5, got {}",
                impact
            )));
        }

        let cause_chain: Vec<String> = self
            .cause_chain
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cause_chain.is_empty() || cause_chain.len() > MAX_CAUSE_CHAIN {
            return Err(SetbackError::validation(format!(
                "cause_chain must have 1 to {} entries, got {}",
                MAX_CAUSE_CHAIN,
                cause_chain.len()
            )));
        }

        Ok(FailureEvent {
            id: id.into(),
            schema_version: EVENT_SCHEMA_VERSION,
            source_ref,
            category,
            archetypes,
            impact,
            topics: self.topics,
            tags: self.tags,
            energy_level: self.energy_level,
            emotional_state: self.emotional_state,
            cause_chain,
            mitigation_principle,
            counter_factual: self.counter_factual,
            evidence_ref: self.evidence_ref,
            linked_test_ref: self.linked_test_ref,
            timestamp: self.timestamp.unwrap_or(now),
            provenance: Provenance {
                origin: self.origin.unwrap_or_default(),
                source_task_ref: self.source_task_ref,
            },
            realization_point: self.realization_point,
        })
    }

    /// Fill this draft with the fields `other` sets.
    ///
    /// Scalars from `other` win when present; lists from `other` win when
    /// non-empty.
    pub fn overlay(self, other: EventDraft) -> EventDraft {
        fn pick<T>(base: Option<T>, over: Option<T>) -> Option<T> {
            over.or(base)
        }
        fn pick_list(base: Vec<String>, over: Vec<String>) -> Vec<String> {
            if over.is_empty() {
                base
            } else {
                over
            }
        }

        EventDraft {
            source_ref: pick(self.source_ref, other.source_ref),
            category: pick(self.category, other.category),
            archetypes: pick_list(self.archetypes, other.archetypes),
            impact: pick(self.impact, other.impact),
            topics: pick_list(self.topics, other.topics),
            tags: pick_list(self.tags, other.tags),
            energy_level: pick(self.energy_level, other.energy_level),
            emotional_state: pick(self.emotional_state, other.emotional_state),
            cause_chain: pick_list(self.cause_chain, other.cause_chain),
            mitigation_principle: pick(self.mitigation_principle, other.mitigation_principle),
            counter_factual: pick(self.counter_factual, other.counter_factual),
            evidence_ref: pick(self.evidence_ref, other.evidence_ref),
            linked_test_ref: pick(self.linked_test_ref, other.linked_test_ref),
            timestamp: pick(self.timestamp, other.timestamp),
            origin: pick(self.origin, other.origin),
            source_task_ref: pick(self.source_task_ref, other.source_task_ref),
            realization_point: pick(self.realization_point, other.realization_point),
        }
    }
}

fn non_empty(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SetbackError::validation(format!("{} is required", field))),
    }
}

fn dedup_preserving_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Generate the next event id for `date`, given the ids already in use.
///
/// Format: `loss_YYYYMMDD_NNN`, where NNN is one past the highest counter
/// already used on that date.
pub fn next_event_id<'a>(existing: impl IntoIterator<Item = &'a str>, date: NaiveDate) -> String {
    let prefix = format!("{}_{}_", EVENT_ID_PREFIX, date.format("%Y%m%d"));
    let next = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(&prefix))
        .filter_map(|counter| counter.parse::<u32>().ok())
        .max()
        .map(|max| max + 1)
        .unwrap_or(1);
    format!("{}{:03}", prefix, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn complete_draft() -> EventDraft {
        EventDraft {
            source_ref: Some("Write chapter 3".to_string()),
            category: Some(FailureCategory::ProcessFailure),
            archetypes: vec!["overthinking".to_string()],
            impact: Some(3),
            cause_chain: vec!["no outline".to_string()],
            mitigation_principle: Some("Outline before drafting".to_string()),
            ..EventDraft::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_validate_complete_draft() {
        let event = complete_draft().validate("loss_20240115_001", now()).unwrap();

        assert_eq!(event.id, "loss_20240115_001");
        assert_eq!(event.archetypes, vec!["overthinking"]);
        assert_eq!(event.timestamp, now());
        assert_eq!(event.provenance.origin, Origin::Manual);
        assert_eq!(event.schema_version, EVENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_validate_rejects_empty_archetypes() {
        let mut draft = complete_draft();
        draft.archetypes = vec!["  ".to_string()];

        let err = draft.validate("id", now()).unwrap_err();
        assert!(err.to_string().contains("archetypes"));
    }

    #[test]
    fn test_validate_rejects_blank_mitigation() {
        let mut draft = complete_draft();
        draft.mitigation_principle = Some("   ".to_string());

        let err = draft.validate("id", now()).unwrap_err();
        assert!(err.to_string().contains("mitigation_principle"));
    }

    #[test]
    fn test_validate_rejects_missing_source_ref() {
        let mut draft = complete_draft();
        draft.source_ref = None;

        assert!(draft.validate("id", now()).unwrap_err().is_rejection());
    }

    #[test]
    fn test_validate_rejects_impact_out_of_range() {
        let mut draft = complete_draft();
        draft.impact = Some(6);
        assert!(draft.validate("id", now()).is_err());

        let mut draft = complete_draft();
        draft.impact = Some(0);
        assert!(draft.validate("id", now()).is_err());
    }

    #[test]
    fn test_validate_rejects_long_cause_chain() {
        let mut draft = complete_draft();
        draft.cause_chain = (0..6).map(|i| format!("cause {}", i)).collect();

        let err = draft.validate("id", now()).unwrap_err();
        assert!(err.to_string().contains("cause_chain"));
    }

    #[test]
    fn test_validate_dedups_archetypes_in_order() {
        let mut draft = complete_draft();
        draft.archetypes = vec![
            "perfectionism".to_string(),
            "overthinking".to_string(),
            "perfectionism".to_string(),
        ];

        let event = draft.validate("id", now()).unwrap();
        assert_eq!(event.archetypes, vec!["perfectionism", "overthinking"]);
    }

    #[test]
    fn test_task_ref_prefers_provenance() {
        let mut draft = complete_draft();
        draft.source_task_ref = Some("task-7".to_string());
        let event = draft.validate("id", now()).unwrap();
        assert_eq!(event.task_ref(), "task-7");

        let event = complete_draft().validate("id", now()).unwrap();
        assert_eq!(event.task_ref(), "Write chapter 3");
    }

    #[test]
    fn test_next_event_id() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        assert_eq!(next_event_id([], date), "loss_20240115_001");

        let existing = ["loss_20240115_001", "loss_20240115_007", "loss_20240114_009"];
        assert_eq!(next_event_id(existing, date), "loss_20240115_008");
    }

    #[test]
    fn test_event_deserializes_with_defaults() {
        let json = r#"{
            "id": "loss_20240115_001",
            "source_ref": "task",
            "category": "skill_gap",
            "archetypes": ["avoidance"],
            "impact": 2,
            "cause_chain": ["tired"],
            "mitigation_principle": "rest first",
            "timestamp": "2024-01-15T12:00:00Z",
            "provenance": {"origin": "quick"}
        }"#;

        let event: FailureEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.category, FailureCategory::SkillGap);
        assert_eq!(event.provenance.origin, Origin::Quick);
        assert!(event.topics.is_empty());
        assert!(event.energy_level.is_none());
    }

    #[test]
    fn test_overlay_prefers_set_fields() {
        let queued = EventDraft {
            source_ref: Some("Write chapter 3".to_string()),
            source_task_ref: Some("task-7".to_string()),
            topics: vec!["writing".to_string()],
            ..EventDraft::default()
        };
        let completion = EventDraft {
            category: Some(FailureCategory::ProcessFailure),
            archetypes: vec!["avoidance".to_string()],
            impact: Some(2),
            cause_chain: vec!["no outline".to_string()],
            mitigation_principle: Some("outline first".to_string()),
            ..EventDraft::default()
        };

        let merged = queued.overlay(completion);

        assert_eq!(merged.source_ref.as_deref(), Some("Write chapter 3"));
        assert_eq!(merged.source_task_ref.as_deref(), Some("task-7"));
        assert_eq!(merged.topics, vec!["writing"]);
        assert_eq!(merged.archetypes, vec!["avoidance"]);
        assert!(merged.validate("loss_20240101_001", Utc::now()).is_ok());
    }
}
