//! Reset command for setback.
//!
//! `reset weekly` archives the current state and then clears the pending
//! queue, deferral counters and transition history. `reset monthly`
//! aggregates the previous month once per period.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::project_dir;
use crate::core::{Engine, EngineState};
use crate::error::{Result, SetbackError};
use crate::stats::{MonthlyOutcome, MonthlyReport, PeriodSummarizer, WeeklyOutcome};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TaskList};
use crate::util::atomic_write;

/// Options for the reset command.
#[derive(Debug, Clone, Default)]
pub struct ResetOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Weekly summarizer that snapshots the state to `.setback/archive/`.
#[derive(Debug, Clone)]
pub struct StateArchive {
    path: PathBuf,
}

impl StateArchive {
    /// Archive file for the week ending on `date`.
    pub fn new(dir: impl AsRef<Path>, date: NaiveDate) -> Self {
        Self {
            path: dir
                .as_ref()
                .join(format!("weekly-{}.json", date.format("%Y%m%d"))),
        }
    }

    /// Archive under the project containing `cwd`.
    pub fn for_project(cwd: &Path, date: NaiveDate) -> Self {
        Self::new(project_dir(cwd).join("archive"), date)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PeriodSummarizer for StateArchive {
    fn summarize(&self, state: &EngineState) -> Result<()> {
        let json =
            serde_json::to_string_pretty(state).map_err(|e| SetbackError::serde(e.to_string()))?;
        atomic_write(&self.path, json.as_bytes())?;
        tracing::debug!("archived weekly state to {}", self.path.display());
        Ok(())
    }
}

/// Which reset ran and what it produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResetResult {
    Weekly(WeeklyOutcome),
    Monthly(MonthlyOutcome),
}

/// Output format for the reset command.
#[derive(Debug, Clone, Serialize)]
pub struct ResetOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResetResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResetOutput {
    fn from_result(result: Result<ResetResult>) -> Self {
        match result {
            Ok(result) => Self {
                success: true,
                result: Some(result),
                error: None,
            },
            Err(e) => Self {
                success: false,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// The reset command implementation.
pub struct ResetCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> ResetCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    /// Summarize, then clear the weekly state.
    pub fn weekly<P>(&mut self, summarizer: &P) -> ResetOutput
    where
        P: PeriodSummarizer + ?Sized,
    {
        ResetOutput::from_result(self.engine.weekly_reset(summarizer).map(ResetResult::Weekly))
    }

    /// Aggregate the month before `now`.
    pub fn monthly(&self, now: DateTime<Utc>) -> ResetOutput {
        ResetOutput::from_result(self.engine.monthly_report(now).map(ResetResult::Monthly))
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ResetOutput, options: &ResetOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ResetOutput) -> String {
        match &output.result {
            Some(ResetResult::Weekly(outcome)) => format!(
                "Weekly reset: cleared {} pending, {} counters, {} history entries.\n",
                outcome.cleared_pending, outcome.reset_counters, outcome.cleared_history
            ),
            Some(ResetResult::Monthly(MonthlyOutcome::AlreadyReported { period })) => {
                format!("Monthly report for {} already exists.\n", period)
            }
            Some(ResetResult::Monthly(MonthlyOutcome::Report(report))) => format_report(report),
            None => format!(
                "Reset failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

fn format_report(report: &MonthlyReport) -> String {
    let mut lines = vec![format!("Monthly report {}: {} events", report.period, report.total)];
    if let Some(avg) = report.average_impact {
        lines.push(format!("  Average impact: {:.1}", avg));
    }
    if !report.top_archetypes.is_empty() {
        lines.push(format!("  Top patterns: {}", report.top_archetypes.join(", ")));
    }
    for (category, n) in &report.by_category {
        lines.push(format!("  {}: {}", category, n));
    }
    lines.join("\n") + "\n"
}
