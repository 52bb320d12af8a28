//! Periodic resets and monthly aggregation.
//!
//! Weekly: an external summarizer runs first; only when it succeeds are the
//! pending queue, deferral counters, and transition ledger cleared.
//!
//! Monthly: the previous month's events are aggregated into a
//! `MonthlyReport` value, once per period. A marker document in the
//! repository records that the period has been reported.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::core::{EngineState, FailureCategory, FailureEvent};
use crate::error::{Result, SetbackError};
use crate::tagging::document::{Document, FrontMatter};
use crate::tagging::documents::DocumentRepository;

/// Produces the weekly summary before state is cleared.
pub trait PeriodSummarizer {
    fn summarize(&self, state: &EngineState) -> Result<()>;
}

impl<F> PeriodSummarizer for F
where
    F: Fn(&EngineState) -> Result<()>,
{
    fn summarize(&self, state: &EngineState) -> Result<()> {
        self(state)
    }
}

/// What a weekly reset cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyOutcome {
    pub cleared_pending: usize,
    pub reset_counters: usize,
    pub cleared_history: usize,
}

/// Run the weekly reset.
///
/// The summarizer sees the state before anything is cleared. If it fails,
/// the error is returned and `state` is left untouched.
pub fn run_weekly<S>(state: &mut EngineState, summarizer: &S) -> Result<WeeklyOutcome>
where
    S: PeriodSummarizer + ?Sized,
{
    summarizer.summarize(state)?;

    let outcome = WeeklyOutcome {
        cleared_pending: state.pending_queue.len(),
        reset_counters: state.deferral_counters.iter().filter(|(_, n)| *n > 0).count(),
        cleared_history: state.history.len(),
    };

    state.pending_queue.clear();
    state.deferral_counters.reset_all();
    state.history.clear();
    state.touch();

    tracing::debug!(
        "weekly reset: {} pending, {} counters, {} history entries",
        outcome.cleared_pending,
        outcome.reset_counters,
        outcome.cleared_history
    );
    Ok(outcome)
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(SetbackError::validation(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// The month before the one containing `today`.
    pub fn previous_month(today: NaiveDate) -> Self {
        if today.month() == 1 {
            Self {
                year: today.year() - 1,
                month: 12,
            }
        } else {
            Self {
                year: today.year(),
                month: today.month() - 1,
            }
        }
    }

    /// Whether `timestamp` falls in this month (UTC).
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp.year() == self.year && timestamp.month() == self.month
    }

    /// `YYYY-MM`.
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Marker document path for this period.
    pub fn marker_path(&self, reports_prefix: &str) -> String {
        format!("{}monthly-{}.md", reports_prefix, self.label())
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Aggregated statistics for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub period: ReportPeriod,
    pub total: usize,
    /// Archetype counts, highest first; ties keep first-seen order.
    pub by_archetype: Vec<(String, usize)>,
    /// Category counts, highest first; ties keep category order.
    pub by_category: Vec<(FailureCategory, usize)>,
    pub top_archetypes: Vec<String>,
    /// Mean impact, `None` for an empty month.
    pub average_impact: Option<f64>,
}

impl MonthlyReport {
    /// Aggregate the events of `period`.
    pub fn build(events: &[FailureEvent], period: ReportPeriod, top_n: usize) -> Self {
        let in_period: Vec<&FailureEvent> =
            events.iter().filter(|e| period.contains(e.timestamp)).collect();

        let mut by_archetype: Vec<(String, usize)> = Vec::new();
        for archetype in in_period.iter().flat_map(|e| e.archetypes.iter()) {
            match by_archetype.iter_mut().find(|(a, _)| a == archetype) {
                Some((_, n)) => *n += 1,
                None => by_archetype.push((archetype.clone(), 1)),
            }
        }
        // Stable sort keeps first-seen order among equal counts
        by_archetype.sort_by(|a, b| b.1.cmp(&a.1));

        let mut by_category: Vec<(FailureCategory, usize)> = FailureCategory::all()
            .iter()
            .map(|c| (*c, in_period.iter().filter(|e| e.category == *c).count()))
            .filter(|(_, n)| *n > 0)
            .collect();
        by_category.sort_by(|a, b| b.1.cmp(&a.1));

        let top_archetypes = by_archetype
            .iter()
            .take(top_n)
            .map(|(a, _)| a.clone())
            .collect();

        let average_impact = if in_period.is_empty() {
            None
        } else {
            let sum: u32 = in_period.iter().map(|e| u32::from(e.impact)).sum();
            Some(f64::from(sum) / in_period.len() as f64)
        };

        Self {
            period,
            total: in_period.len(),
            by_archetype,
            by_category,
            top_archetypes,
            average_impact,
        }
    }
}

/// Result of a monthly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MonthlyOutcome {
    Report(MonthlyReport),
    AlreadyReported { period: ReportPeriod },
}

/// Aggregate `period` unless its marker already exists.
pub fn run_monthly<R>(
    events: &[FailureEvent],
    period: ReportPeriod,
    repo: &R,
    vault: &VaultConfig,
) -> Result<MonthlyOutcome>
where
    R: DocumentRepository + ?Sized,
{
    let marker = period.marker_path(&vault.reports_prefix);
    if repo.exists(&marker) {
        tracing::debug!("monthly report for {} already exists at {}", period, marker);
        return Ok(MonthlyOutcome::AlreadyReported { period });
    }
    Ok(MonthlyOutcome::Report(MonthlyReport::build(
        events,
        period,
        vault.monthly_top_n,
    )))
}

/// Record that `report` has been delivered by creating its marker document.
///
/// The marker carries the report as front matter; rendering it into
/// something human-readable is left to the caller.
pub fn mark_reported<R>(report: &MonthlyReport, repo: &R, vault: &VaultConfig) -> Result<String>
where
    R: DocumentRepository + ?Sized,
{
    let path = report.period.marker_path(&vault.reports_prefix);
    let doc = Document {
        front_matter: Some(FrontMatter::from_serializable(report)?),
        body: String::new(),
    };
    repo.create(&path, &doc.render()?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventDraft, PendingDeferral};
    use crate::stats::history::HistoryEntry;
    use crate::tagging::documents::MemoryDocumentRepository;
    use chrono::TimeZone;

    fn event(archetypes: &[&str], category: FailureCategory, impact: u8, day: u32) -> FailureEvent {
        EventDraft {
            source_ref: Some("task".to_string()),
            category: Some(category),
            archetypes: archetypes.iter().map(|a| a.to_string()).collect(),
            impact: Some(impact),
            cause_chain: vec!["cause".to_string()],
            mitigation_principle: Some("principle".to_string()),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap()),
            ..EventDraft::default()
        }
        .validate(format!("loss_202401{:02}_001", day), Utc::now())
        .unwrap()
    }

    fn busy_state() -> EngineState {
        let mut state = EngineState::new();
        state.deferral_counters.increment("task-1");
        state.deferral_counters.increment("task-2");
        state
            .pending_queue
            .enqueue(PendingDeferral::new("later", EventDraft::new("later")));
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        state.history.append(HistoryEntry::new(day, "a"), 30);
        state.history.append(HistoryEntry::new(day, "b"), 30);
        state
    }

    #[test]
    fn test_weekly_reset_clears_everything() {
        let mut state = busy_state();

        let outcome = run_weekly(&mut state, &|_: &EngineState| -> Result<()> { Ok(()) }).unwrap();

        assert_eq!(
            outcome,
            WeeklyOutcome {
                cleared_pending: 1,
                reset_counters: 2,
                cleared_history: 2
            }
        );
        assert_eq!(state.deferral_counters.get("task-1"), 0);
        assert_eq!(state.deferral_counters.get("task-2"), 0);
        assert!(state.pending_queue.is_empty());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_weekly_summarizer_sees_state_before_clearing() {
        let mut state = busy_state();
        let seen = std::cell::Cell::new(0);

        run_weekly(&mut state, &|s: &EngineState| -> Result<()> {
            seen.set(s.history.len());
            Ok(())
        })
        .unwrap();

        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_failing_summarizer_leaves_state_untouched() {
        let mut state = busy_state();
        let before = state.clone();

        let result = run_weekly(&mut state, &|_: &EngineState| -> Result<()> {
            Err(SetbackError::document("vault unavailable"))
        });

        assert!(result.is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_previous_month() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(ReportPeriod::previous_month(jan), ReportPeriod { year: 2023, month: 12 });

        let mar = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(ReportPeriod::previous_month(mar), ReportPeriod { year: 2024, month: 2 });
        assert_eq!(ReportPeriod::previous_month(mar).label(), "2024-02");
    }

    #[test]
    fn test_period_validation() {
        assert!(ReportPeriod::new(2024, 0).is_err());
        assert!(ReportPeriod::new(2024, 13).is_err());
        assert!(ReportPeriod::new(2024, 12).is_ok());
    }

    #[test]
    fn test_monthly_report_aggregates_period() {
        let events = vec![
            event(&["overthinking"], FailureCategory::ProcessFailure, 2, 3),
            event(&["procrastination", "overthinking"], FailureCategory::SkillGap, 4, 10),
            event(&["procrastination"], FailureCategory::ProcessFailure, 3, 20),
            event(&["perfectionism"], FailureCategory::KnowledgeGap, 5, 25),
        ];
        let mut outside = event(&["ignored"], FailureCategory::SkillGap, 1, 1);
        outside.timestamp = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut all = events.clone();
        all.push(outside);

        let report = MonthlyReport::build(&all, ReportPeriod::new(2024, 1).unwrap(), 2);

        assert_eq!(report.total, 4);
        assert_eq!(
            report.by_archetype,
            vec![
                ("overthinking".to_string(), 2),
                ("procrastination".to_string(), 2),
                ("perfectionism".to_string(), 1),
            ]
        );
        assert_eq!(report.top_archetypes, vec!["overthinking", "procrastination"]);
        assert_eq!(report.by_category[0], (FailureCategory::ProcessFailure, 2));
        assert_eq!(report.average_impact, Some(3.5));
    }

    #[test]
    fn test_monthly_runs_once_per_period() {
        let repo = MemoryDocumentRepository::new();
        let vault = VaultConfig::default();
        let period = ReportPeriod::new(2024, 1).unwrap();
        let events = vec![event(&["a"], FailureCategory::SkillGap, 3, 5)];

        let first = run_monthly(&events, period, &repo, &vault).unwrap();
        let MonthlyOutcome::Report(report) = first else {
            panic!("expected a report");
        };
        assert_eq!(report.total, 1);

        let path = mark_reported(&report, &repo, &vault).unwrap();
        assert_eq!(path, "Reports/monthly-2024-01.md");

        let second = run_monthly(&events, period, &repo, &vault).unwrap();
        assert_eq!(second, MonthlyOutcome::AlreadyReported { period });

        let stored: MonthlyReport = repo
            .read_metadata(&path)
            .unwrap()
            .unwrap()
            .deserialize()
            .unwrap();
        assert_eq!(stored.total, 1);
    }

    #[test]
    fn test_empty_month() {
        let report = MonthlyReport::build(&[], ReportPeriod::new(2024, 1).unwrap(), 3);
        assert_eq!(report.total, 0);
        assert!(report.average_impact.is_none());
        assert!(report.top_archetypes.is_empty());
    }
}
