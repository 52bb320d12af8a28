//! Core types and logic for setback.
//!
//! This module contains the failure event model, the deferral state machine,
//! persisted engine state, the notification bus, and the engine that ties
//! them together.

pub mod bus;
pub mod deferral;
pub mod engine;
pub mod event;
pub mod state;

pub use bus::{ConsoleNotifier, EventBus, EventLogged, Notifier, SilentNotifier};
pub use deferral::{
    is_synthesis_task, threshold_for, DeferralCounters, DeferralPhase, DeferralStatus,
};
pub use engine::{
    DeferralReport, Engine, PendingRecompute, PostLogStep, StatusSnapshot, StepReport, StepResult,
};
pub use event::{
    next_event_id, EnergyLevel, EventDraft, FailureCategory, FailureEvent, Origin, Provenance,
    EVENT_SCHEMA_VERSION,
};
pub use state::{DominantChange, EngineState, PendingDeferral, PendingQueue, STATE_SCHEMA_VERSION};
