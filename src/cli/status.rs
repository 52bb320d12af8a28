//! Status command for setback.
//!
//! Shows decayed archetype scores, the dominant pattern, the transition
//! history summary, and open deferrals.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{Engine, StatusSnapshot};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TaskList};

/// Options for the status command.
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Number of scores shown in text output (0 = all).
    pub top: usize,
}

/// Output format for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    pub success: bool,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

/// The status command implementation.
pub struct StatusCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> StatusCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    /// Recompute scores as of `now` and report.
    pub fn run(&mut self, now: DateTime<Utc>) -> StatusOutput {
        StatusOutput {
            success: true,
            snapshot: self.engine.status(now),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &StatusOutput, options: &StatusOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output, options)
        }
    }

    fn format_human_readable(&self, output: &StatusOutput, options: &StatusOptions) -> String {
        let snapshot = &output.snapshot;
        let mut lines = Vec::new();

        lines.push(format!(
            "Dominant pattern: {}",
            snapshot.dominant.as_deref().unwrap_or("none")
        ));

        if snapshot.scores.is_empty() {
            lines.push("No events in the scoring window.".to_string());
        } else {
            lines.push(format!("Scores ({} events):", snapshot.counted));
            let mut ranked = snapshot.scores.clone();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            let shown = match options.top {
                0 => ranked.len(),
                n => n,
            };
            for (archetype, score) in ranked.iter().take(shown) {
                lines.push(format!("  {:<24} {:.3}", archetype, score));
            }
        }
        if snapshot.skipped > 0 {
            lines.push(format!("Skipped {} unreadable events.", snapshot.skipped));
        }

        let history = &snapshot.history;
        if history.transitions > 0 {
            lines.push(String::new());
            lines.push(format!("History ({} transitions)", history.transitions));
            if let Some((archetype, n)) = &history.most_frequent {
                lines.push(format!("  Most frequent: {} ({})", archetype, n));
            }
            if let Some((archetype, n)) = &history.longest_run {
                lines.push(format!("  Longest run: {} ({})", archetype, n));
            }
            lines.push(format!("  Recent distinct: {}", history.recent_unique));
        }

        if !snapshot.deferrals.is_empty() {
            lines.push(String::new());
            lines.push("Deferred:".to_string());
            for (task_ref, count) in &snapshot.deferrals {
                lines.push(format!("  {} x{}", task_ref, count));
            }
        }

        if snapshot.pending > 0 {
            lines.push(String::new());
            lines.push(format!("{} pending reflection(s).", snapshot.pending));
        }

        lines.join("\n") + "\n"
    }
}
