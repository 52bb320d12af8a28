//! Pending queue commands for setback.
//!
//! `later` stores a partial draft keyed by its source_ref; `pending` lists
//! what is waiting. Entries leave the queue through `log --pending`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{Engine, EventDraft, PendingDeferral};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TaskList};

/// Options for the pending commands.
#[derive(Debug, Clone, Default)]
pub struct PendingOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// A queued context as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct PendingItem {
    pub source_ref: String,
    pub queued_at: DateTime<Utc>,
    /// Origin of the context, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl From<&PendingDeferral> for PendingItem {
    fn from(pending: &PendingDeferral) -> Self {
        Self {
            source_ref: pending.source_ref.clone(),
            queued_at: pending.queued_at,
            origin: pending
                .context
                .origin
                .map(|o| format!("{:?}", o).to_lowercase()),
        }
    }
}

/// Output format for the pending commands.
#[derive(Debug, Clone, Serialize)]
pub struct PendingOutput {
    pub success: bool,
    /// Key of the entry just queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<String>,
    pub items: Vec<PendingItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PendingOutput {
    pub fn success(queued: Option<String>, items: Vec<PendingItem>) -> Self {
        Self {
            success: true,
            queued,
            items,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            queued: None,
            items: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The later/pending command implementation.
pub struct PendingCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> PendingCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    /// Queue `draft` for later.
    pub fn queue(&mut self, draft: EventDraft) -> PendingOutput {
        match self.engine.log_later(draft) {
            Ok(key) => PendingOutput::success(Some(key), self.items()),
            Err(e) => PendingOutput::failure(e.to_string()),
        }
    }

    /// List the queue, oldest first.
    pub fn list(&self) -> PendingOutput {
        PendingOutput::success(None, self.items())
    }

    fn items(&self) -> Vec<PendingItem> {
        self.engine.pending().map(PendingItem::from).collect()
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &PendingOutput, options: &PendingOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &PendingOutput) -> String {
        if !output.success {
            return format!(
                "Pending failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        if let Some(key) = &output.queued {
            lines.push(format!("Queued '{}' for later.", key));
        }

        if output.items.is_empty() {
            lines.push("Nothing pending.".to_string());
        } else {
            lines.push(format!("Pending ({}):", output.items.len()));
            for item in &output.items {
                let origin = item
                    .origin
                    .as_deref()
                    .map(|o| format!(" [{}]", o))
                    .unwrap_or_default();
                lines.push(format!(
                    "  {}  {}{}",
                    item.queued_at.format("%Y-%m-%d %H:%M"),
                    item.source_ref,
                    origin
                ));
            }
        }

        lines.join("\n") + "\n"
    }
}
