//! Engine state owned by setback.
//!
//! `EngineState` is the single persisted record of everything the engine
//! owns: the current dominant archetype, the transition ledger, deferral
//! counters, and the queue of pending "log later" contexts. It is passed
//! explicitly to every operation and saved through a `StateStore`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::deferral::DeferralCounters;
use crate::core::event::EventDraft;
use crate::stats::history::{HistoryEntry, HistoryLedger};

/// Schema version for persisted engine state.
pub const STATE_SCHEMA_VERSION: u8 = 1;

/// Persisted engine state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineState {
    /// Schema version for forward compatibility.
    #[serde(default = "default_state_version")]
    pub schema_version: u8,
    /// Current dominant archetype.
    #[serde(default)]
    pub dominant_category: Option<String>,
    /// Dominant-category transitions.
    #[serde(default)]
    pub history: HistoryLedger,
    /// Deferral counters keyed by task reference.
    #[serde(default)]
    pub deferral_counters: DeferralCounters,
    /// Contexts waiting to be turned into events.
    #[serde(default)]
    pub pending_queue: PendingQueue,
    /// When the state was last changed.
    pub updated_at: DateTime<Utc>,
}

fn default_state_version() -> u8 {
    STATE_SCHEMA_VERSION
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            dominant_category: None,
            history: HistoryLedger::new(),
            deferral_counters: DeferralCounters::new(),
            pending_queue: PendingQueue::new(),
            updated_at: Utc::now(),
        }
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a newly computed dominant archetype.
    ///
    /// When it differs from the stored one, the previous value (if any) is
    /// appended to the ledger dated `today`, and the change is returned so
    /// the caller can publish it. A first-ever dominant is a change but adds
    /// no ledger entry. Clearing the dominant (no events left in the window)
    /// is also a change and adds no ledger entry either.
    pub fn apply_dominant(
        &mut self,
        dominant: Option<String>,
        today: NaiveDate,
        history_cap: usize,
    ) -> Option<DominantChange> {
        if dominant == self.dominant_category {
            return None;
        }

        let previous = self.dominant_category.take();
        if let (Some(old), Some(_)) = (&previous, &dominant) {
            self.history
                .append(HistoryEntry::new(today, old.clone()), history_cap);
        }
        self.dominant_category = dominant.clone();
        self.touch();

        Some(DominantChange {
            old: previous,
            new: dominant,
        })
    }

    /// Update the `updated_at` timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A change of dominant archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantChange {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// An event context queued for later resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDeferral {
    /// Queue key.
    pub source_ref: String,
    /// What was known when the event was put off.
    pub context: EventDraft,
    /// When it was queued.
    pub queued_at: DateTime<Utc>,
}

impl PendingDeferral {
    pub fn new(source_ref: impl Into<String>, context: EventDraft) -> Self {
        Self {
            source_ref: source_ref.into(),
            context,
            queued_at: Utc::now(),
        }
    }
}

/// Queue of pending deferrals keyed by `source_ref`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue {
    items: Vec<PendingDeferral>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `pending`, replacing any entry with the same key in place.
    pub fn enqueue(&mut self, pending: PendingDeferral) {
        match self
            .items
            .iter_mut()
            .find(|p| p.source_ref == pending.source_ref)
        {
            Some(existing) => *existing = pending,
            None => self.items.push(pending),
        }
    }

    /// Remove and return the entry for `source_ref`.
    pub fn take(&mut self, source_ref: &str) -> Option<PendingDeferral> {
        let pos = self.items.iter().position(|p| p.source_ref == source_ref)?;
        Some(self.items.remove(pos))
    }

    pub fn get(&self, source_ref: &str) -> Option<&PendingDeferral> {
        self.items.iter().find(|p| p.source_ref == source_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingDeferral> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_first_dominant_has_no_history() {
        let mut state = EngineState::new();

        let change = state.apply_dominant(Some("overthinking".to_string()), day(1), 30);

        assert_eq!(
            change,
            Some(DominantChange {
                old: None,
                new: Some("overthinking".to_string())
            })
        );
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_change_appends_previous() {
        let mut state = EngineState::new();
        state.apply_dominant(Some("a".to_string()), day(1), 30);

        let change = state.apply_dominant(Some("b".to_string()), day(2), 30);

        assert_eq!(change.unwrap().old.as_deref(), Some("a"));
        let entry = state.history.last().unwrap();
        assert_eq!(entry.category, "a");
        assert_eq!(entry.date, day(2));
        assert_eq!(state.dominant_category.as_deref(), Some("b"));
    }

    #[test]
    fn test_same_dominant_is_not_a_change() {
        let mut state = EngineState::new();
        state.apply_dominant(Some("a".to_string()), day(1), 30);

        assert!(state.apply_dominant(Some("a".to_string()), day(2), 30).is_none());
        assert_eq!(state.dominant_category.as_deref(), Some("a"));
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_none_clears_dominant_without_history() {
        let mut state = EngineState::new();
        assert!(state.apply_dominant(None, day(1), 30).is_none());

        state.apply_dominant(Some("a".to_string()), day(1), 30);
        let change = state.apply_dominant(None, day(3), 30);

        assert_eq!(
            change,
            Some(DominantChange {
                old: Some("a".to_string()),
                new: None
            })
        );
        assert!(state.dominant_category.is_none());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_history_bound_after_many_changes() {
        let mut state = EngineState::new();
        for i in 0..40 {
            state.apply_dominant(Some(format!("c{}", i)), day(1), 30);
        }

        assert_eq!(state.history.len(), 30);
        assert_eq!(state.history.entries().next().unwrap().category, "c9");
        assert_eq!(state.history.last().unwrap().category, "c38");
    }

    #[test]
    fn test_pending_queue_replaces_by_key() {
        let mut queue = PendingQueue::new();
        queue.enqueue(PendingDeferral::new("task-1", EventDraft::new("first")));
        queue.enqueue(PendingDeferral::new("task-2", EventDraft::new("other")));
        queue.enqueue(PendingDeferral::new("task-1", EventDraft::new("second")));

        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.get("task-1").unwrap().context.source_ref.as_deref(),
            Some("second")
        );

        let taken = queue.take("task-1").unwrap();
        assert_eq!(taken.source_ref, "task-1");
        assert!(queue.take("task-1").is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = EngineState::new();
        state.apply_dominant(Some("a".to_string()), day(1), 30);
        state.apply_dominant(Some("b".to_string()), day(2), 30);
        state.deferral_counters.increment("task-7");
        state
            .pending_queue
            .enqueue(PendingDeferral::new("later", EventDraft::new("later")));

        let json = serde_json::to_string(&state).unwrap();
        let parsed: EngineState = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, state);
    }

    #[test]
    fn test_state_deserializes_sparse_json() {
        let parsed: EngineState =
            serde_json::from_str(r#"{"updated_at":"2024-01-01T00:00:00Z"}"#).unwrap();

        assert!(parsed.dominant_category.is_none());
        assert!(parsed.history.is_empty());
        assert_eq!(parsed.schema_version, STATE_SCHEMA_VERSION);
    }
}
