//! Decay aggregation of failure events into a dominant archetype.
//!
//! Scoring logic:
//! 1. Keep events with `now - timestamp <= window_days`
//! 2. weight = decay_factor ^ days_since(timestamp), with fractional days
//! 3. Every archetype of an event receives the event's weight
//! 4. dominant = highest score; ties go to the archetype seen first
//!
//! Events outside the window are dropped rather than decayed toward zero so
//! the scan stays bounded.

use std::cell::Cell;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DecayConfig;
use crate::core::FailureEvent;
use crate::error::{Result, SetbackError};

/// Weight of an event at age zero.
pub const BASE_WEIGHT: f64 = 1.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Scores produced by one recompute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecayOutcome {
    /// Archetype scores in first-seen order.
    pub scores: Vec<(String, f64)>,
    /// Highest-scoring archetype, if any event was in the window.
    pub dominant: Option<String>,
    /// Number of events that contributed.
    pub counted: usize,
    /// Number of events skipped as malformed.
    pub skipped: usize,
}

impl DecayOutcome {
    /// Score for a single archetype (0.0 when absent).
    pub fn score(&self, archetype: &str) -> f64 {
        self.scores
            .iter()
            .find(|(a, _)| a == archetype)
            .map(|(_, s)| *s)
            .unwrap_or(0.0)
    }
}

/// Fractional days between `timestamp` and `now`.
pub fn days_since(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = now - timestamp;
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0 / SECONDS_PER_DAY,
        None => elapsed.num_seconds() as f64 / SECONDS_PER_DAY,
    }
}

/// Decayed weight of an event at `now`.
///
/// Exactly `BASE_WEIGHT` at age zero and strictly decreasing with age for
/// any decay factor below 1.0. Negative ages are clamped to zero.
pub fn weight(timestamp: DateTime<Utc>, now: DateTime<Utc>, decay_factor: f64) -> f64 {
    let days = days_since(timestamp, now).max(0.0);
    BASE_WEIGHT * decay_factor.powf(days)
}

/// Whether an event falls inside the trailing window.
pub fn in_window(timestamp: DateTime<Utc>, now: DateTime<Utc>, window_days: u32) -> bool {
    now - timestamp <= Duration::days(window_days as i64)
}

/// Recompute archetype scores and the dominant archetype.
///
/// Events timestamped after `now` or carrying no archetypes are skipped and
/// logged; the recompute itself never fails.
pub fn recompute(events: &[FailureEvent], now: DateTime<Utc>, config: &DecayConfig) -> DecayOutcome {
    let mut outcome = DecayOutcome::default();

    for event in events {
        if event.timestamp > now {
            tracing::debug!("skipping event {} timestamped in the future", event.id);
            outcome.skipped += 1;
            continue;
        }
        if event.archetypes.is_empty() {
            tracing::warn!("skipping event {} with no archetypes", event.id);
            outcome.skipped += 1;
            continue;
        }
        if !in_window(event.timestamp, now, config.window_days) {
            continue;
        }

        let w = weight(event.timestamp, now, config.decay_factor);
        for archetype in &event.archetypes {
            match outcome.scores.iter_mut().find(|(a, _)| a == archetype) {
                Some((_, score)) => *score += w,
                None => outcome.scores.push((archetype.clone(), w)),
            }
        }
        outcome.counted += 1;
    }

    outcome.dominant = dominant_of(&outcome.scores);
    outcome
}

/// Archetype with the highest score; the first one seen wins ties.
fn dominant_of(scores: &[(String, f64)]) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for (archetype, score) in scores {
        if best.is_none_or(|(_, top)| *score > top) {
            best = Some((archetype.as_str(), *score));
        }
    }
    best.map(|(a, _)| a.to_string())
}

/// Ticket identifying one requested recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecomputeTicket(u64);

impl RecomputeTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Hands out recompute tickets and rejects results from superseded ones.
///
/// A newer `begin` supersedes every earlier ticket; committing a stale
/// ticket fails so its (possibly outdated) result is discarded.
#[derive(Debug, Default)]
pub struct RecomputeGate {
    latest: Cell<u64>,
}

impl RecomputeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a recompute, superseding any in flight.
    pub fn begin(&self) -> RecomputeTicket {
        let next = self.latest.get() + 1;
        self.latest.set(next);
        RecomputeTicket(next)
    }

    /// Accept `outcome` only if `ticket` is still the latest.
    pub fn commit<T>(&self, ticket: RecomputeTicket, outcome: T) -> Result<T> {
        let latest = self.latest.get();
        if ticket.0 == latest {
            Ok(outcome)
        } else {
            tracing::debug!("discarding recompute {} (latest {})", ticket.0, latest);
            Err(SetbackError::Superseded {
                ticket: ticket.0,
                latest,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventDraft, FailureCategory};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(id: &str, archetypes: &[&str], age_days: i64) -> FailureEvent {
        EventDraft {
            source_ref: Some("task".to_string()),
            category: Some(FailureCategory::ProcessFailure),
            archetypes: archetypes.iter().map(|a| a.to_string()).collect(),
            impact: Some(3),
            cause_chain: vec!["cause".to_string()],
            mitigation_principle: Some("principle".to_string()),
            timestamp: Some(now() - Duration::days(age_days)),
            ..EventDraft::default()
        }
        .validate(id, now())
        .unwrap()
    }

    #[test]
    fn test_weight_is_one_at_age_zero() {
        assert_eq!(weight(now(), now(), 0.95), 1.0);
    }

    #[test]
    fn test_weight_ten_days() {
        let w = weight(now() - Duration::days(10), now(), 0.95);
        assert!((w - 0.95f64.powi(10)).abs() < 1e-12);
        assert!((w - 0.5987).abs() < 1e-4);
    }

    #[test]
    fn test_scenario_decay_dominant() {
        let events = vec![
            event("e1", &["overthinking"], 0),
            event("e2", &["procrastination"], 10),
        ];

        let outcome = recompute(&events, now(), &DecayConfig::default());

        assert_eq!(outcome.score("overthinking"), 1.0);
        assert!((outcome.score("procrastination") - 0.5987).abs() < 1e-4);
        assert_eq!(outcome.dominant.as_deref(), Some("overthinking"));
        assert_eq!(outcome.counted, 2);
    }

    #[test]
    fn test_event_reinforces_every_archetype() {
        let events = vec![event("e1", &["overthinking", "process-failure"], 0)];

        let outcome = recompute(&events, now(), &DecayConfig::default());

        assert_eq!(outcome.score("overthinking"), 1.0);
        assert_eq!(outcome.score("process-failure"), 1.0);
        assert_eq!(outcome.scores.len(), 2);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let events = vec![event("e1", &["b"], 2), event("e2", &["a"], 2)];

        let outcome = recompute(&events, now(), &DecayConfig::default());

        assert_eq!(outcome.dominant.as_deref(), Some("b"));
    }

    #[test]
    fn test_window_excludes_old_events() {
        let events = vec![event("old", &["stale"], 31), event("edge", &["edge"], 30)];

        let outcome = recompute(&events, now(), &DecayConfig::default());

        assert_eq!(outcome.score("stale"), 0.0);
        assert!(outcome.score("edge") > 0.0);
        assert_eq!(outcome.dominant.as_deref(), Some("edge"));
    }

    #[test]
    fn test_no_events_no_dominant() {
        let outcome = recompute(&[], now(), &DecayConfig::default());
        assert!(outcome.dominant.is_none());
        assert!(outcome.scores.is_empty());
    }

    #[test]
    fn test_malformed_events_are_skipped() {
        let mut future = event("future", &["later"], 0);
        future.timestamp = now() + Duration::days(1);
        let mut bare = event("bare", &["x"], 0);
        bare.archetypes.clear();
        let good = event("good", &["ok"], 1);

        let outcome = recompute(&[future, bare, good], now(), &DecayConfig::default());

        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.counted, 1);
        assert_eq!(outcome.dominant.as_deref(), Some("ok"));
    }

    #[test]
    fn test_recompute_gate_supersedes_stale_ticket() {
        let gate = RecomputeGate::new();
        let first = gate.begin();
        let second = gate.begin();

        assert!(matches!(
            gate.commit(first, ()),
            Err(SetbackError::Superseded {
                ticket: 1,
                latest: 2
            })
        ));
        assert!(gate.commit(second, ()).is_ok());
    }

    proptest! {
        #[test]
        fn prop_weight_strictly_decreasing(a in 0u32..(30 * 24), b in 0u32..(30 * 24)) {
            prop_assume!(a < b);
            let wa = weight(now() - Duration::hours(a as i64), now(), 0.95);
            let wb = weight(now() - Duration::hours(b as i64), now(), 0.95);
            prop_assert!(wa > wb);
            prop_assert!(wb > 0.0);
        }

        #[test]
        fn prop_recompute_is_deterministic(ages in proptest::collection::vec(0i64..40, 0..20)) {
            let names = ["a", "b", "c"];
            let events: Vec<FailureEvent> = ages
                .iter()
                .enumerate()
                .map(|(i, age)| event(&format!("e{}", i), &[names[i % 3]], *age))
                .collect();

            let first = recompute(&events, now(), &DecayConfig::default());
            let second = recompute(&events, now(), &DecayConfig::default());
            prop_assert_eq!(first, second);
        }
    }
}
