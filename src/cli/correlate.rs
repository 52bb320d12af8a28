//! Correlate command for setback.
//!
//! Lists the co-occurrence patterns that exceed their thresholds across all
//! stored events.

use serde::Serialize;

use crate::core::Engine;
use crate::stats::{CorrelationFinding, PairingKind};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{DocumentRepository, TaskList};

/// Options for the correlate command.
#[derive(Debug, Clone, Default)]
pub struct CorrelateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Only report this pairing.
    pub kind: Option<PairingKind>,
}

/// Output format for the correlate command.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelateOutput {
    pub success: bool,
    pub findings: Vec<CorrelationFinding>,
}

/// The correlate command implementation.
pub struct CorrelateCommand<E, D, T, S> {
    engine: Engine<E, D, T, S>,
}

impl<E, D, T, S> CorrelateCommand<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    pub fn new(engine: Engine<E, D, T, S>) -> Self {
        Self { engine }
    }

    pub fn run(&self, options: &CorrelateOptions) -> CorrelateOutput {
        let findings = self
            .engine
            .correlations()
            .into_iter()
            .filter(|f| options.kind.is_none_or(|kind| f.kind == kind))
            .collect();
        CorrelateOutput {
            success: true,
            findings,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CorrelateOutput, options: &CorrelateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &CorrelateOutput) -> String {
        if output.findings.is_empty() {
            return "No correlations above threshold.\n".to_string();
        }

        let mut lines = vec![format!("Correlations ({}):", output.findings.len())];
        for finding in &output.findings {
            let c = &finding.correlation;
            lines.push(format!(
                "  {} -> {}: {:.0}% ({}/{}, threshold {}%)",
                c.first.label(),
                c.second.label(),
                c.pct,
                c.both_count,
                c.first_count,
                finding.threshold
            ));
        }
        lines.join("\n") + "\n"
    }
}
