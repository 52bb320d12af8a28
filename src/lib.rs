//! setback - failure memory and habit-correction engine
//!
//! setback records structured failure events, keeps a time-decayed score per
//! failure archetype, and escalates tasks that keep getting put off. Events
//! live in a document vault or a JSONL log; derived state is persisted
//! best-effort next to them.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod stats;
pub mod storage;
pub mod tagging;
pub mod util;

pub use config::Config;
pub use core::{
    ConsoleNotifier, DeferralReport, DominantChange, Engine, EngineState, EventBus, EventDraft,
    FailureCategory, FailureEvent, Notifier, PostLogStep, SilentNotifier, StatusSnapshot,
    StepReport, StepResult,
};
pub use error::{FailOpen, Result, SetbackError};
pub use stats::{
    analyze, recompute, CorrelationFinding, DecayOutcome, HistoryLedger, HistoryStats,
    MonthlyOutcome, MonthlyReport, PeriodSummarizer, ReportPeriod, WeeklyOutcome,
};
pub use storage::{
    DocumentEventStore, EventSink, EventSource, FileStateStore, JsonlEventStore,
    MemoryEventStore, MemoryStateStore, ProjectEventStore, StateStore,
};
pub use tagging::{
    DocumentRepository, FileTaskList, FsDocumentRepository, MemoryDocumentRepository,
    MemoryTaskList, TagOutcome, TagTarget, Tagger, TaskList,
};

// CLI commands
pub use cli::{
    CorrelateCommand, DeferCommand, InitCommand, LogCommand, PendingCommand, ResetCommand,
    StatusCommand, TagCommand,
};
