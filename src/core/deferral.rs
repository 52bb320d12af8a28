//! Deferral counting and escalation.
//!
//! Each task reference moves through `Idle(0) -> Deferred(n) ->
//! Escalated(n >= threshold)` as it is put off, and back to `Idle` when it is
//! resolved or a periodic reset runs. Counters are created lazily on the first
//! increment and never go negative.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DeferralConfig;

/// Phase of a single task reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "count", rename_all = "snake_case")]
pub enum DeferralPhase {
    Idle,
    Deferred(u32),
    Escalated(u32),
}

/// Result of deferring a task once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferralStatus {
    /// Count after this deferral.
    pub count: u32,
    /// Threshold that applies to the reference.
    pub threshold: u32,
    /// True on every call once `count >= threshold`.
    pub escalated: bool,
}

impl DeferralStatus {
    /// True only on the call that reached the threshold.
    ///
    /// Repeats are not suppressed by the counter; callers that want a single
    /// prompt per crossing check this instead of `escalated`.
    pub fn crossed(&self) -> bool {
        self.count == self.threshold
    }
}

/// Per-task deferral counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeferralCounters {
    counts: BTreeMap<String, u32>,
}

impl DeferralCounters {
    /// Create an empty set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for `task_ref`; 0 for unknown references.
    pub fn get(&self, task_ref: &str) -> u32 {
        self.counts.get(task_ref).copied().unwrap_or(0)
    }

    /// Add one deferral and return the new count.
    pub fn increment(&mut self, task_ref: &str) -> u32 {
        let count = self.counts.entry(task_ref.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Set the count for `task_ref` to 0, known or not.
    pub fn reset(&mut self, task_ref: &str) {
        if let Some(count) = self.counts.get_mut(task_ref) {
            *count = 0;
        }
    }

    /// Set every tracked counter to 0.
    pub fn reset_all(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
    }

    /// Tracked references and their counts, in reference order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of tracked references (including ones reset to 0).
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Increment `task_ref` and report its escalation status.
    pub fn defer(&mut self, task_ref: &str, config: &DeferralConfig) -> DeferralStatus {
        let count = self.increment(task_ref);
        let threshold = threshold_for(task_ref, config);
        DeferralStatus {
            count,
            threshold,
            escalated: count >= threshold,
        }
    }

    /// Current phase of `task_ref`.
    pub fn phase(&self, task_ref: &str, config: &DeferralConfig) -> DeferralPhase {
        match self.get(task_ref) {
            0 => DeferralPhase::Idle,
            n if n >= threshold_for(task_ref, config) => DeferralPhase::Escalated(n),
            n => DeferralPhase::Deferred(n),
        }
    }
}

/// Whether `task_ref` belongs to the synthesis category.
pub fn is_synthesis_task(task_ref: &str, config: &DeferralConfig) -> bool {
    let lower = task_ref.to_lowercase();
    config
        .special_markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|marker| lower.contains(&marker.to_lowercase()))
}

/// Escalation threshold for `task_ref`.
pub fn threshold_for(task_ref: &str, config: &DeferralConfig) -> u32 {
    if is_synthesis_task(task_ref, config) {
        config.threshold_special
    } else {
        config.threshold_generic
    }
}
