//! Correlation analysis over failure events.
//!
//! For a pair of predicates (A, B), the correlation is the share of events
//! matching A that also match B:
//!
//! ```text
//! pct = |A and B| / |A| * 100
//! ```
//!
//! Standard pairings scanned by `analyze`:
//! - ArchetypeEnergy: archetype x energy level (generic threshold)
//! - ArchetypeEmotion: archetype x emotional state (generic threshold)
//! - CategoryImpact: category x high impact (generic threshold)
//! - TopicCategory: topic x category (paired threshold)
//!
//! A pairing is reported when `pct` strictly exceeds its threshold. There is
//! no minimum sample size, so a single matching event yields 100%.

use serde::{Deserialize, Serialize};

use crate::config::CorrelationConfig;
use crate::core::{EnergyLevel, FailureCategory, FailureEvent};

/// A condition an event may satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "value", rename_all = "snake_case")]
pub enum EventPredicate {
    Archetype(String),
    Energy(EnergyLevel),
    /// Emotional state, compared case-insensitively.
    Emotion(String),
    Category(FailureCategory),
    /// Impact at or above the given value.
    HighImpact(u8),
    Topic(String),
}

impl EventPredicate {
    /// Whether `event` satisfies this predicate.
    pub fn matches(&self, event: &FailureEvent) -> bool {
        match self {
            Self::Archetype(a) => event.has_archetype(a),
            Self::Energy(level) => event.energy_level == Some(*level),
            Self::Emotion(state) => event
                .emotional_state
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(state.trim())),
            Self::Category(category) => event.category == *category,
            Self::HighImpact(min) => event.impact >= *min,
            Self::Topic(topic) => event.topics.iter().any(|t| t == topic),
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> String {
        match self {
            Self::Archetype(a) => format!("archetype:{}", a),
            Self::Energy(level) => format!("energy:{}", level.as_str()),
            Self::Emotion(state) => format!("emotion:{}", state),
            Self::Category(category) => format!("category:{}", category),
            Self::HighImpact(min) => format!("impact>={}", min),
            Self::Topic(topic) => format!("topic:{}", topic),
        }
    }
}

/// Which standard pairing produced a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingKind {
    ArchetypeEnergy,
    ArchetypeEmotion,
    CategoryImpact,
    TopicCategory,
}

impl PairingKind {
    /// Threshold that applies to this pairing.
    pub fn threshold(&self, config: &CorrelationConfig) -> u8 {
        match self {
            Self::TopicCategory => config.threshold_paired,
            _ => config.threshold_generic,
        }
    }
}

/// Co-occurrence of two predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub first: EventPredicate,
    pub second: EventPredicate,
    /// Events matching `first`.
    pub first_count: usize,
    /// Events matching both.
    pub both_count: usize,
    /// `both_count / first_count * 100`.
    pub pct: f64,
}

/// A correlation that exceeded its pairing's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFinding {
    pub kind: PairingKind,
    pub threshold: u8,
    pub correlation: Correlation,
}

/// Correlate two predicates over `events`.
///
/// Returns `None` when no event matches `first`.
pub fn correlate(
    events: &[FailureEvent],
    first: &EventPredicate,
    second: &EventPredicate,
) -> Option<Correlation> {
    let (first_count, both_count) = events
        .iter()
        .filter(|e| first.matches(e))
        .fold((0usize, 0usize), |(n, both), e| {
            (n + 1, both + usize::from(second.matches(e)))
        });

    if first_count == 0 {
        return None;
    }

    Some(Correlation {
        first: first.clone(),
        second: second.clone(),
        first_count,
        both_count,
        pct: both_count as f64 * 100.0 / first_count as f64,
    })
}

/// Scan the standard pairings and return every correlation above its
/// threshold, in pairing order.
pub fn analyze(events: &[FailureEvent], config: &CorrelationConfig) -> Vec<CorrelationFinding> {
    let archetypes = distinct(events.iter().flat_map(|e| e.archetypes.iter().cloned()));
    let energies = distinct(events.iter().filter_map(|e| e.energy_level));
    let emotions = distinct(events.iter().filter_map(|e| {
        e.emotional_state
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }));
    let categories = distinct(events.iter().map(|e| e.category));
    let topics = distinct(events.iter().flat_map(|e| e.topics.iter().cloned()));

    let mut pairs: Vec<(PairingKind, EventPredicate, EventPredicate)> = Vec::new();
    for a in &archetypes {
        for level in &energies {
            pairs.push((
                PairingKind::ArchetypeEnergy,
                EventPredicate::Archetype(a.clone()),
                EventPredicate::Energy(*level),
            ));
        }
    }
    for a in &archetypes {
        for state in &emotions {
            pairs.push((
                PairingKind::ArchetypeEmotion,
                EventPredicate::Archetype(a.clone()),
                EventPredicate::Emotion(state.clone()),
            ));
        }
    }
    for category in &categories {
        pairs.push((
            PairingKind::CategoryImpact,
            EventPredicate::Category(*category),
            EventPredicate::HighImpact(config.impact_high_threshold),
        ));
    }
    for topic in &topics {
        for category in &categories {
            pairs.push((
                PairingKind::TopicCategory,
                EventPredicate::Topic(topic.clone()),
                EventPredicate::Category(*category),
            ));
        }
    }

    pairs
        .into_iter()
        .filter_map(|(kind, first, second)| {
            let threshold = kind.threshold(config);
            let correlation = correlate(events, &first, &second)?;
            (correlation.pct > f64::from(threshold)).then_some(CorrelationFinding {
                kind,
                threshold,
                correlation,
            })
        })
        .collect()
}

fn distinct<T: PartialEq>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut out = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
