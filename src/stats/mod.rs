//! Derived statistics for setback.
//!
//! Decay aggregation of events into a dominant archetype, the bounded ledger
//! of dominant changes, correlation analysis, and periodic resets. Everything
//! here is a pure function of events and state except the monthly marker.

pub mod correlation;
pub mod decay;
pub mod history;
pub mod reset;

pub use correlation::{
    analyze, correlate, Correlation, CorrelationFinding, EventPredicate, PairingKind,
};
pub use decay::{recompute, DecayOutcome, RecomputeGate, RecomputeTicket};
pub use history::{HistoryEntry, HistoryLedger, HistoryStats};
pub use reset::{
    mark_reported, run_monthly, run_weekly, MonthlyOutcome, MonthlyReport, PeriodSummarizer,
    ReportPeriod, WeeklyOutcome,
};
