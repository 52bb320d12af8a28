//! Storage traits for setback.
//!
//! `StateStore` persists the engine's own state. `EventSource` and
//! `EventSink` are the read and write sides of an event store owned by a
//! collaborator.

use std::sync::Arc;

use crate::core::{EngineState, FailureEvent};
use crate::error::Result;

/// Persistence for `EngineState`.
pub trait StateStore {
    /// Load the saved state.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> Result<Option<EngineState>>;

    /// Save the state, replacing whatever was there.
    fn save(&self, state: &EngineState) -> Result<()>;
}

/// Blanket implementation of StateStore for Arc-wrapped stores.
///
/// This allows sharing one store between an engine and a test.
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self) -> Result<Option<EngineState>> {
        (**self).load()
    }

    fn save(&self, state: &EngineState) -> Result<()> {
        (**self).save(state)
    }
}

/// Read-only view over stored failure events.
pub trait EventSource {
    /// Every readable event. Malformed entries are skipped, not reported.
    fn events(&self) -> Result<Vec<FailureEvent>>;

    /// Ids of every readable event.
    fn ids(&self) -> Result<Vec<String>> {
        Ok(self.events()?.into_iter().map(|e| e.id).collect())
    }
}

/// Write side of an event store.
pub trait EventSink {
    /// Persist a validated event.
    fn record(&self, event: &FailureEvent) -> Result<()>;
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    fn events(&self) -> Result<Vec<FailureEvent>> {
        (**self).events()
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn record(&self, event: &FailureEvent) -> Result<()> {
        (**self).record(event)
    }
}

/// Test utilities for storage implementations.
#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::core::{EventDraft, FailureCategory, PendingDeferral};
    use chrono::{NaiveDate, TimeZone, Utc};

    /// A valid event with the given id and archetype.
    pub fn sample_event(id: &str, archetype: &str) -> FailureEvent {
        EventDraft {
            source_ref: Some("Write chapter 3".to_string()),
            category: Some(FailureCategory::ProcessFailure),
            archetypes: vec![archetype.to_string()],
            impact: Some(3),
            cause_chain: vec!["started late".to_string()],
            mitigation_principle: Some("start with an outline".to_string()),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()),
            ..EventDraft::default()
        }
        .validate(id, Utc::now())
        .unwrap()
    }

    /// Test helper to verify StateStore implementations.
    pub fn test_state_store<S: StateStore>(store: &S) {
        // Nothing saved yet
        assert!(store.load().unwrap().is_none());

        let mut state = EngineState::new();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        state.apply_dominant(Some("a".to_string()), day, 30);
        state.apply_dominant(Some("b".to_string()), day, 30);
        state.deferral_counters.increment("task-7");
        state
            .pending_queue
            .enqueue(PendingDeferral::new("later", EventDraft::new("later")));

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state.clone()));

        // Saving again replaces
        state.deferral_counters.reset_all();
        store.save(&state).unwrap();
        assert_eq!(
            store.load().unwrap().unwrap().deferral_counters.get("task-7"),
            0
        );
    }

    /// Test helper to verify event store implementations.
    pub fn test_event_store<S: EventSource + EventSink>(store: &S) {
        assert!(store.events().unwrap().is_empty());

        let first = sample_event("loss_20240101_001", "overthinking");
        let second = sample_event("loss_20240101_002", "procrastination");
        store.record(&first).unwrap();
        store.record(&second).unwrap();

        let events = store.events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.contains(&first));
        assert!(events.contains(&second));

        let mut ids = store.ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["loss_20240101_001", "loss_20240101_002"]);
    }
}
