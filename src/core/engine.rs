//! The setback engine.
//!
//! Owns `EngineState` and wires the event store, document repository, task
//! list, and state store together. Logging an event runs an explicit list of
//! post-log steps:
//!
//! 1. UpdateDominant: recompute decay scores and record a dominant change
//! 2. TagSource: mark the source document or task `#failed-on-YYYYMMDD`
//! 3. ResetDeferral: zero the deferral counter of the source task
//! 4. PersistState: save state (best-effort)
//!
//! Each step reports its own `StepResult`; a failing step never stops the
//! ones after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::bus::{EventBus, EventLogged, Notifier};
use crate::core::deferral::DeferralStatus;
use crate::core::event::{next_event_id, EventDraft, FailureEvent, Origin};
use crate::core::state::{DominantChange, EngineState, PendingDeferral};
use crate::error::{FailOpen, Result, SetbackError};
use crate::stats::correlation::{self, CorrelationFinding};
use crate::stats::decay::{self, DecayOutcome, RecomputeGate, RecomputeTicket};
use crate::stats::history::HistoryStats;
use crate::stats::reset::{self, MonthlyOutcome, PeriodSummarizer, ReportPeriod, WeeklyOutcome};
use crate::storage::{EventSink, EventSource, StateStore};
use crate::tagging::{failure_tag, DocumentRepository, TagOutcome, TagTarget, Tagger, TaskList};

/// Side effects run after an event is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostLogStep {
    UpdateDominant,
    TagSource,
    ResetDeferral,
    PersistState,
}

impl PostLogStep {
    /// Steps in the order they run.
    pub fn all() -> &'static [PostLogStep] {
        &[
            PostLogStep::UpdateDominant,
            PostLogStep::TagSource,
            PostLogStep::ResetDeferral,
            PostLogStep::PersistState,
        ]
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum StepResult {
    Done,
    Skipped(String),
    Failed(String),
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }
}

/// What happened after an event was logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub event: FailureEvent,
    pub steps: Vec<(PostLogStep, StepResult)>,
    pub dominant_change: Option<DominantChange>,
    pub tag: Option<TagOutcome>,
    /// Tag targets that could not be marked.
    pub failed_tags: usize,
}

impl StepReport {
    pub fn result_of(&self, step: PostLogStep) -> Option<&StepResult> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, r)| r)
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|(_, r)| r.is_failed())
    }
}

/// Result of deferring a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferralReport {
    pub task_ref: String,
    pub status: DeferralStatus,
    /// Whether the user was asked to log the failure now.
    pub prompted: bool,
    /// Whether a pending context was queued from the prompt.
    pub queued: bool,
}

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub dominant: Option<String>,
    pub scores: Vec<(String, f64)>,
    pub counted: usize,
    pub skipped: usize,
    pub history: HistoryStats,
    /// Non-zero deferral counters.
    pub deferrals: Vec<(String, u32)>,
    pub pending: usize,
}

/// A scored recompute waiting to be applied.
#[derive(Debug, Clone)]
pub struct PendingRecompute {
    ticket: RecomputeTicket,
    now: DateTime<Utc>,
    outcome: DecayOutcome,
}

impl PendingRecompute {
    pub fn outcome(&self) -> &DecayOutcome {
        &self.outcome
    }
}

/// The failure memory engine.
pub struct Engine<E, D, T, S> {
    events: E,
    documents: D,
    tasks: T,
    store: S,
    config: Config,
    state: EngineState,
    gate: RecomputeGate,
    bus: EventBus,
}

impl<E, D, T, S> Engine<E, D, T, S>
where
    E: EventSource + EventSink,
    D: DocumentRepository,
    T: TaskList,
    S: StateStore,
{
    /// Build an engine, loading saved state from `store`.
    ///
    /// Unreadable state is logged and replaced with an empty state.
    pub fn new(events: E, documents: D, tasks: T, store: S, config: Config) -> Self {
        let state = store
            .load()
            .fail_open_default("loading engine state")
            .unwrap_or_default();
        Self {
            events,
            documents,
            tasks,
            store,
            config,
            state,
            gate: RecomputeGate::new(),
            bus: EventBus::new(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    pub fn event_store(&self) -> &E {
        &self.events
    }

    /// Validate, store, and process a new event.
    ///
    /// # Errors
    ///
    /// `SetbackError::Validation` for incomplete drafts; storage errors when
    /// the event cannot be stored. Post-log step failures are reported in
    /// the `StepReport`, not as errors.
    pub fn create_log(&mut self, draft: EventDraft, now: DateTime<Utc>) -> Result<StepReport> {
        // Reject before touching the store
        draft.clone().validate("pending", now)?;

        let date = draft.timestamp.unwrap_or(now).date_naive();
        let ids = self.events.ids()?;
        let id = next_event_id(ids.iter().map(String::as_str), date);
        let event = draft.validate(id, now)?;
        self.events.record(&event)?;
        tracing::debug!("logged event {}", event.id);

        let mut report = StepReport {
            event,
            steps: Vec::new(),
            dominant_change: None,
            tag: None,
            failed_tags: 0,
        };
        for step in PostLogStep::all() {
            let result = self.run_step(*step, now, &mut report);
            report.steps.push((*step, result));
        }

        self.bus.publish_event_logged(&EventLogged {
            event: report.event.clone(),
            reference: report.event.task_ref().to_string(),
        });
        Ok(report)
    }

    fn run_step(&mut self, step: PostLogStep, now: DateTime<Utc>, report: &mut StepReport) -> StepResult {
        match step {
            PostLogStep::UpdateDominant => {
                let (_, change) = self.recompute_dominant(now);
                report.dominant_change = change;
                StepResult::Done
            }
            PostLogStep::TagSource => {
                let Some(source) = report.event.provenance.source_task_ref.as_deref() else {
                    return StepResult::Skipped("no source task reference".to_string());
                };
                let target = TagTarget::parse(source);
                let tag = failure_tag(report.event.date());
                match self.tag(&target, &tag) {
                    Ok(outcome) => {
                        report.tag = Some(outcome);
                        StepResult::Done
                    }
                    Err(e) => {
                        tracing::warn!("could not tag {}: {}", source, e);
                        report.failed_tags += 1;
                        StepResult::Failed(e.to_string())
                    }
                }
            }
            PostLogStep::ResetDeferral => {
                self.state.deferral_counters.reset(report.event.task_ref());
                self.state.touch();
                StepResult::Done
            }
            PostLogStep::PersistState => self.persist(),
        }
    }

    /// Start a recompute: take a ticket and score the events as of `now`.
    ///
    /// The result is only applied by `finish_recompute`. Starting another
    /// recompute in between supersedes this one, so a caller that reads
    /// events slowly can never overwrite a fresher dominant.
    pub fn begin_recompute(&self, now: DateTime<Utc>) -> PendingRecompute {
        let ticket = self.gate.begin();
        let events = self.events.events().fail_open_default("reading events");
        PendingRecompute {
            ticket,
            now,
            outcome: decay::recompute(&events, now, &self.config.decay),
        }
    }

    /// Apply a recompute started by `begin_recompute`.
    ///
    /// # Errors
    ///
    /// `SetbackError::Superseded` when a newer recompute was started; state
    /// is left untouched.
    pub fn finish_recompute(
        &mut self,
        pending: PendingRecompute,
    ) -> Result<(DecayOutcome, Option<DominantChange>)> {
        let outcome = self.gate.commit(pending.ticket, pending.outcome)?;

        let change = self.state.apply_dominant(
            outcome.dominant.clone(),
            pending.now.date_naive(),
            self.config.history.cap,
        );
        if let Some(ref change) = change {
            self.bus.publish_dominant_changed(change);
        }
        Ok((outcome, change))
    }

    fn recompute_dominant(&mut self, now: DateTime<Utc>) -> (DecayOutcome, Option<DominantChange>) {
        let pending = self.begin_recompute(now);
        match self.finish_recompute(pending) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!("{}", e);
                (DecayOutcome::default(), None)
            }
        }
    }

    /// Recompute the dominant archetype now, persisting any change.
    pub fn recompute(&mut self, now: DateTime<Utc>) -> DecayOutcome {
        let (outcome, change) = self.recompute_dominant(now);
        if change.is_some() {
            self.persist();
        }
        outcome
    }

    /// Apply a tag to a document or task.
    pub fn tag(&self, target: &TagTarget, tag: &str) -> Result<TagOutcome> {
        Tagger::new(&self.documents, &self.tasks).apply_tag(target, tag)
    }

    /// Record one deferral of `task_ref`.
    ///
    /// Once the count reaches the threshold every call prompts through
    /// `notifier`; accepting queues a proactive pending context for the task.
    pub fn defer(&mut self, task_ref: &str, notifier: &dyn Notifier) -> Result<DeferralReport> {
        let task_ref = task_ref.trim();
        if task_ref.is_empty() {
            return Err(SetbackError::validation("task reference must not be empty"));
        }

        let status = self.state.deferral_counters.defer(task_ref, &self.config.deferral);
        self.state.touch();

        let mut report = DeferralReport {
            task_ref: task_ref.to_string(),
            status,
            prompted: false,
            queued: false,
        };

        if status.escalated {
            report.prompted = true;
            let prompt = format!(
                "'{}' has been put off {} times. Log what is getting in the way?",
                task_ref, status.count
            );
            if notifier.confirm(&prompt) {
                let context = EventDraft {
                    source_ref: Some(task_ref.to_string()),
                    source_task_ref: Some(task_ref.to_string()),
                    origin: Some(Origin::Proactive),
                    ..EventDraft::default()
                };
                self.state
                    .pending_queue
                    .enqueue(PendingDeferral::new(task_ref, context));
                report.queued = true;
                notifier.info(&format!("Queued '{}' for reflection.", task_ref));
            }
        }

        self.persist();
        Ok(report)
    }

    /// Reset the deferral counter of `task_ref`.
    pub fn resolve(&mut self, task_ref: &str) {
        self.state.deferral_counters.reset(task_ref.trim());
        self.state.touch();
        self.persist();
    }

    /// Queue a partial event to be completed later, keyed by its source_ref.
    pub fn log_later(&mut self, draft: EventDraft) -> Result<String> {
        let key = draft
            .source_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SetbackError::validation("source_ref is required"))?
            .to_string();

        self.state
            .pending_queue
            .enqueue(PendingDeferral::new(key.clone(), draft));
        self.state.touch();
        self.persist();
        Ok(key)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingDeferral> {
        self.state.pending_queue.iter()
    }

    /// Complete a queued context with `completion` and log it.
    ///
    /// The queued entry is kept if the merged draft is rejected.
    pub fn resolve_pending(
        &mut self,
        key: &str,
        completion: EventDraft,
        now: DateTime<Utc>,
    ) -> Result<StepReport> {
        let pending = self
            .state
            .pending_queue
            .take(key)
            .ok_or_else(|| SetbackError::invalid_state(format!("nothing pending for '{}'", key)))?;

        let draft = pending.context.clone().overlay(completion);
        match self.create_log(draft, now) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.state.pending_queue.enqueue(pending);
                Err(e)
            }
        }
    }

    /// Scores, dominant archetype, and ledger statistics as of `now`.
    pub fn status(&mut self, now: DateTime<Utc>) -> StatusSnapshot {
        let outcome = self.recompute(now);
        StatusSnapshot {
            dominant: outcome.dominant.clone(),
            scores: outcome.scores,
            counted: outcome.counted,
            skipped: outcome.skipped,
            history: HistoryStats::from_ledger(&self.state.history, self.config.history.recent_window),
            deferrals: self
                .state
                .deferral_counters
                .iter()
                .filter(|(_, n)| *n > 0)
                .map(|(r, n)| (r.to_string(), n))
                .collect(),
            pending: self.state.pending_queue.len(),
        }
    }

    /// Correlations above threshold across every stored event.
    pub fn correlations(&self) -> Vec<CorrelationFinding> {
        let events = self.events.events().fail_open_default("reading events");
        correlation::analyze(&events, &self.config.correlation)
    }

    /// Run the weekly reset and persist the cleared state.
    pub fn weekly_reset<P>(&mut self, summarizer: &P) -> Result<WeeklyOutcome>
    where
        P: PeriodSummarizer + ?Sized,
    {
        let outcome = reset::run_weekly(&mut self.state, summarizer)?;
        self.persist();
        Ok(outcome)
    }

    /// Aggregate the month before `now`, once per period.
    ///
    /// A fresh report is marked in the document repository so the next run
    /// for the same period returns `AlreadyReported`.
    pub fn monthly_report(&self, now: DateTime<Utc>) -> Result<MonthlyOutcome> {
        let period = ReportPeriod::previous_month(now.date_naive());
        let events = self.events.events().fail_open_default("reading events");
        let outcome = reset::run_monthly(&events, period, &self.documents, &self.config.vault)?;
        if let MonthlyOutcome::Report(ref report) = outcome {
            let marker = reset::mark_reported(report, &self.documents, &self.config.vault)?;
            tracing::debug!("marked monthly report at {}", marker);
        }
        Ok(outcome)
    }

    /// Save state; failures are logged and retried on the next mutation.
    fn persist(&self) -> StepResult {
        match self.store.save(&self.state) {
            Ok(()) => StepResult::Done,
            Err(e) => {
                tracing::warn!("failed to persist engine state: {} (will retry)", e);
                StepResult::Failed(e.to_string())
            }
        }
    }
}

impl<E, D, T, S> std::fmt::Debug for Engine<E, D, T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
