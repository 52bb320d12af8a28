//! Bounded ledger of dominant-category transitions.
//!
//! Each entry records the date a transition happened and the category that
//! was dominant *before* it. The ledger holds at most `cap` entries and
//! evicts the oldest first. All statistics are pure reads.

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default ledger capacity.
pub const DEFAULT_HISTORY_CAP: usize = 30;

/// Default window for `recent_unique_count`.
pub const DEFAULT_RECENT_WINDOW: usize = 5;

/// One dominant-category transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Date of the transition.
    pub date: NaiveDate,
    /// Category that was dominant before the transition.
    pub category: String,
}

impl HistoryEntry {
    pub fn new(date: NaiveDate, category: impl Into<String>) -> Self {
        Self {
            date,
            category: category.into(),
        }
    }
}

/// Append-only, FIFO-bounded transition ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, evicting the oldest while the ledger exceeds `cap`.
    pub fn append(&mut self, entry: HistoryEntry, cap: usize) {
        self.entries.push_back(entry);
        while self.entries.len() > cap {
            self.entries.pop_front();
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Category with the most entries; ties go to the one seen first.
    pub fn most_frequent(&self) -> Option<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for entry in &self.entries {
            match counts.iter_mut().find(|(c, _)| *c == entry.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((entry.category.as_str(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (category, n) in counts {
            if best.is_none_or(|(_, top)| n > top) {
                best = Some((category, n));
            }
        }
        best
    }

    /// Longest run of consecutive entries with the same category; ties go
    /// to the run encountered first.
    pub fn longest_run(&self) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        let mut current: Option<(&str, usize)> = None;

        for entry in &self.entries {
            current = match current {
                Some((c, n)) if c == entry.category => Some((c, n + 1)),
                _ => Some((entry.category.as_str(), 1)),
            };
            if let Some((c, n)) = current {
                if best.is_none_or(|(_, top)| n > top) {
                    best = Some((c, n));
                }
            }
        }
        best
    }

    /// Number of distinct categories among the last `window` entries.
    pub fn recent_unique_count(&self, window: usize) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for entry in self.entries.iter().rev().take(window) {
            if !seen.contains(&entry.category.as_str()) {
                seen.push(entry.category.as_str());
            }
        }
        seen.len()
    }
}

/// Summary of the ledger for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub transitions: usize,
    pub most_frequent: Option<(String, usize)>,
    pub longest_run: Option<(String, usize)>,
    pub recent_unique: usize,
}

impl HistoryStats {
    pub fn from_ledger(ledger: &HistoryLedger, recent_window: usize) -> Self {
        Self {
            transitions: ledger.len(),
            most_frequent: ledger.most_frequent().map(|(c, n)| (c.to_string(), n)),
            longest_run: ledger.longest_run().map(|(c, n)| (c.to_string(), n)),
            recent_unique: ledger.recent_unique_count(recent_window),
        }
    }
}
