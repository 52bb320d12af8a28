//! CLI commands for setback.
//!
//! Commands are grouped as:
//! - **Capture**: log, later, pending
//! - **Escalation**: defer, resolve, tag
//! - **Review**: status, correlate, reset
//! - **Utility**: init
//!
//! Each command wraps an `Engine` built by `context::open_engine` and
//! formats its output as text or JSON.

pub mod context;

// Capture
pub mod log;
pub mod pending;

// Escalation
pub mod defer;
pub mod tag;

// Review
pub mod correlate;
pub mod reset;
pub mod status;

// Utility
pub mod init;

pub use context::{open_engine, ProjectEngine};
pub use correlate::CorrelateCommand;
pub use defer::DeferCommand;
pub use init::InitCommand;
pub use log::LogCommand;
pub use pending::PendingCommand;
pub use reset::{ResetCommand, StateArchive};
pub use status::StatusCommand;
pub use tag::TagCommand;
