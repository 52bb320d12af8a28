//! Defer and resolve commands for setback.
//!
//! `defer` counts one more postponement of a task and, past the threshold,
//! asks whether to reflect on it now. `resolve` clears the count.

use serde::Serialize;

use crate::core::{threshold_for, DeferralReport, Engine, Notifier};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TaskList};

/// Options for the defer and resolve commands.
#[derive(Debug, Clone, Default)]
pub struct DeferOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the defer and resolve commands.
#[derive(Debug, Clone, Serialize)]
pub struct DeferOutput {
    pub success: bool,
    pub task_ref: String,
    /// Deferral count after the command.
    pub count: u32,
    pub threshold: u32,
    /// Whether the count is at or past the threshold.
    pub escalated: bool,
    /// Whether the user was asked to reflect.
    pub prompted: bool,
    /// Whether a pending context was queued.
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeferOutput {
    pub fn from_report(report: &DeferralReport) -> Self {
        Self {
            success: true,
            task_ref: report.task_ref.clone(),
            count: report.status.count,
            threshold: report.status.threshold,
            escalated: report.status.escalated,
            prompted: report.prompted,
            queued: report.queued,
            error: None,
        }
    }

    pub fn resolved(task_ref: impl Into<String>, threshold: u32) -> Self {
        Self {
            success: true,
            task_ref: task_ref.into(),
            count: 0,
            threshold,
            escalated: false,
            prompted: false,
            queued: false,
            error: None,
        }
    }

    pub fn failure(task_ref: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            task_ref: task_ref.into(),
            count: 0,
            threshold: 0,
            escalated: false,
            prompted: false,
            queued: false,
            error: Some(error.into()),
        }
    }
}

/// The defer/resolve command implementation.
pub struct DeferCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> DeferCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    /// Record one deferral of `task_ref`, prompting through `notifier` once
    /// escalated.
    pub fn defer(&mut self, task_ref: &str, notifier: &dyn Notifier) -> DeferOutput {
        match self.engine.defer(task_ref, notifier) {
            Ok(report) => DeferOutput::from_report(&report),
            Err(e) => DeferOutput::failure(task_ref, e.to_string()),
        }
    }

    /// Clear the deferral count of `task_ref`.
    pub fn resolve(&mut self, task_ref: &str) -> DeferOutput {
        let task_ref = task_ref.trim();
        if task_ref.is_empty() {
            return DeferOutput::failure(task_ref, "task reference must not be empty");
        }
        self.engine.resolve(task_ref);
        let threshold = threshold_for(task_ref, &self.engine.config().deferral);
        DeferOutput::resolved(task_ref, threshold)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &DeferOutput, options: &DeferOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &DeferOutput) -> String {
        if !output.success {
            return format!(
                "Defer failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.count == 0 {
            return format!("'{}' resolved.\n", output.task_ref);
        }

        let mut text = format!(
            "'{}' deferred {}/{}.",
            output.task_ref, output.count, output.threshold
        );
        if output.escalated {
            text.push_str(" Escalated.");
        }
        if output.queued {
            text.push_str(" Queued for reflection.");
        }
        text + "\n"
    }
}
