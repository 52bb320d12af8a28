//! Unified error types for setback with fail-open persistence.
//!
//! Validation errors are raised synchronously at the boundary and rejected.
//! Everything downstream of a validated event is best-effort: persistence and
//! tagging failures are logged and left for the next mutating call to retry.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for setback operations.
#[derive(Error, Debug)]
pub enum SetbackError {
    /// I/O errors from state, event log, or document files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON, YAML, or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// An event draft is missing required fields.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A tag target could not be resolved to a document or task.
    #[error("target not found: {target}")]
    TargetNotFound { target: String },

    /// Document repository errors (unreadable, malformed front matter).
    #[error("document error: {message}")]
    Document { message: String },

    /// State machine violations.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// A recompute result was committed after a newer one was requested.
    #[error("recompute {ticket} superseded by {latest}")]
    Superseded { ticket: u64, latest: u64 },
}

/// A specialized Result type for setback operations.
pub type Result<T> = std::result::Result<T, SetbackError>;

impl SetbackError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a target-not-found error.
    pub fn target_not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Create a document error.
    pub fn document(message: impl Into<String>) -> Self {
        Self::Document {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Whether the error came from rejecting caller input rather than from
    /// infrastructure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<io::Error> for SetbackError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SetbackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for SetbackError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Used where a failure must not abort the caller: log a warning and carry on
/// with a safe value.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the setback CLI.
pub mod exit_codes {
    /// Command completed.
    pub const OK: i32 = 0;

    /// Command failed or input was rejected.
    pub const ERROR: i32 = 1;

    /// A deferral crossed its escalation threshold.
    pub const ESCALATED: i32 = 2;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}
