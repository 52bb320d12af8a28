//! In-memory storage for testing.
//!
//! Thread-safe implementations of `StateStore` and the event store traits,
//! primarily for use in unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::core::{EngineState, FailureEvent};
use crate::error::{Result, SetbackError};
use crate::storage::{EventSink, EventSource, StateStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory state store for testing.
///
/// Can be told to fail saves to exercise fail-open persistence.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<EngineState>>,
    fail_saves: AtomicBool,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `state`.
    pub fn with_state(state: EngineState) -> Self {
        let store = Self::new();
        *lock(&store.state) = Some(state);
        store
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        *lock(&self.saves)
    }

    /// The last saved state.
    pub fn snapshot(&self) -> Option<EngineState> {
        lock(&self.state).clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<EngineState>> {
        Ok(lock(&self.state).clone())
    }

    fn save(&self, state: &EngineState) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SetbackError::storage(
                "memory",
                std::io::Error::other("save disabled"),
            ));
        }
        *lock(&self.state) = Some(state.clone());
        *lock(&self.saves) += 1;
        Ok(())
    }
}

/// In-memory event store for testing.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<FailureEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<FailureEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }
}

impl EventSource for MemoryEventStore {
    fn events(&self) -> Result<Vec<FailureEvent>> {
        Ok(lock(&self.events).clone())
    }
}

impl EventSink for MemoryEventStore {
    fn record(&self, event: &FailureEvent) -> Result<()> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}
