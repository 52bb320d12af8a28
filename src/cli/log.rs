//! Log command for setback.
//!
//! Turns a JSON event draft into a stored failure event and runs the
//! post-log steps. With `--pending KEY` the draft completes a queued
//! context instead of standing alone.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{Engine, EventDraft, PostLogStep, StepReport, StepResult};
use crate::error::{Result, SetbackError};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TagOutcome, TaskList};

/// Options for the log command.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// One post-log step in the output.
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    pub step: PostLogStep,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Output format for the log command.
#[derive(Debug, Clone, Serialize)]
pub struct LogOutput {
    /// Whether the event was stored.
    pub success: bool,
    /// Assigned event id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Dominant archetype after logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant: Option<String>,
    /// Whether the dominant archetype changed.
    pub dominant_changed: bool,
    /// Outcome of tagging the source task or document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagOutcome>,
    pub steps: Vec<StepInfo>,
    /// Error message if the event was rejected or not stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogOutput {
    /// Create a successful output from a step report.
    pub fn success(report: &StepReport, dominant: Option<String>) -> Self {
        Self {
            success: true,
            event_id: Some(report.event.id.clone()),
            dominant,
            dominant_changed: report.dominant_change.is_some(),
            tag: report.tag,
            steps: report
                .steps
                .iter()
                .map(|(step, result)| StepInfo {
                    step: *step,
                    result: result.clone(),
                })
                .collect(),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            event_id: None,
            dominant: None,
            dominant_changed: false,
            tag: None,
            steps: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Parse a JSON event draft.
pub fn parse_draft(input: &str) -> Result<EventDraft> {
    if input.trim().is_empty() {
        return Err(SetbackError::validation("no event draft given"));
    }
    serde_json::from_str(input).map_err(|e| SetbackError::serde(format!("invalid draft: {}", e)))
}

/// The log command implementation.
pub struct LogCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> LogCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    /// Create a new log command.
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    /// Log a standalone draft.
    pub fn run(&mut self, draft: EventDraft, now: DateTime<Utc>) -> LogOutput {
        let result = self.engine.create_log(draft, now);
        self.to_output(result)
    }

    /// Complete the pending context queued under `key` with `completion`.
    pub fn run_pending(&mut self, key: &str, completion: EventDraft, now: DateTime<Utc>) -> LogOutput {
        let result = self.engine.resolve_pending(key, completion, now);
        self.to_output(result)
    }

    fn to_output(&self, result: Result<StepReport>) -> LogOutput {
        match result {
            Ok(report) => {
                if report.has_failures() {
                    tracing::warn!("event {} logged with failed steps", report.event.id);
                }
                LogOutput::success(&report, self.engine.state().dominant_category.clone())
            }
            Err(e) => LogOutput::failure(e.to_string()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &LogOutput, options: &LogOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &LogOutput) -> String {
        if !output.success {
            return format!(
                "Log failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = vec![format!(
            "Logged {}.",
            output.event_id.as_deref().unwrap_or("event")
        )];

        match (&output.dominant, output.dominant_changed) {
            (Some(d), true) => lines.push(format!("Dominant pattern is now: {}", d)),
            (Some(d), false) => lines.push(format!("Dominant pattern: {}", d)),
            (None, _) => {}
        }

        if output.tag == Some(TagOutcome::Applied) {
            lines.push("Source marked.".to_string());
        }

        for info in &output.steps {
            if let StepResult::Failed(reason) = &info.result {
                lines.push(format!("Warning: {:?} failed: {}", info.step, reason));
            }
        }

        lines.join("\n") + "\n"
    }
}
