//! Change-tracking recorder.
//!
//! Purely additive bookkeeping over the edit stream: while tracking is
//! enabled every observed insert/delete delta is appended to a bounded log;
//! while disabled, edits pass through untouched and nothing is recorded.
//! Recording never blocks or transforms the edit itself.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ChangeEntry, ChangeKind};

#[derive(Debug)]
pub struct ChangeTracker {
    enabled: bool,
    entries: VecDeque<ChangeEntry>,
    limit: usize,
}

impl ChangeTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            enabled: false,
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Rebuild from a persisted change log (oldest first). Tracking mode is
    /// not persisted; a reloaded session starts with tracking off.
    pub fn from_entries(limit: usize, entries: Vec<ChangeEntry>) -> Self {
        let mut tracker = Self {
            enabled: false,
            entries: VecDeque::from(entries),
            limit,
        };
        tracker.trim();
        tracker
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append a delta if tracking is enabled. Returns the entry id when one
    /// was recorded.
    pub fn record(
        &mut self,
        kind: ChangeKind,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<Uuid> {
        if !self.enabled || text.is_empty() {
            return None;
        }
        let id = Uuid::new_v4();
        self.entries.push_back(ChangeEntry {
            id,
            kind,
            text: text.to_string(),
            timestamp,
        });
        self.trim();
        Some(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ChangeEntry> {
        self.entries.iter().cloned().collect()
    }

    fn trim(&mut self) {
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }
}
