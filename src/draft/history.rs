//! Bounded version history.
//!
//! Snapshots are immutable once recorded and the capacity bound holds as an
//! invariant after every mutation: the structure trims from the head (the
//! oldest `saved_at` among held entries) the moment an append would exceed
//! the limit, rather than truncating as a later cleanup step.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{SaveReason, VersionSnapshot};

#[derive(Debug)]
pub struct VersionHistory {
    entries: VecDeque<VersionSnapshot>,
    limit: usize,
}

impl VersionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Rebuild from a persisted snapshot list (newest last). Aggregates
    /// written under a larger limit are trimmed oldest-first on load.
    pub fn from_snapshots(limit: usize, snapshots: Vec<VersionSnapshot>) -> Self {
        let mut history = Self {
            entries: VecDeque::from(snapshots),
            limit,
        };
        history.trim();
        history
    }

    /// Append a snapshot of `content`, evicting oldest entries past the
    /// bound. Returns the new snapshot's id.
    pub fn record(
        &mut self,
        reason: SaveReason,
        content: &str,
        saved_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.push_back(VersionSnapshot {
            id,
            content: content.to_string(),
            saved_at,
            reason,
        });
        self.trim();
        id
    }

    /// Content of the snapshot with the given id, or `None` when the id is
    /// unknown (already evicted or invalid). Callers treat `None` as a
    /// no-op, not an error: history can be evicted out from under a stale
    /// reference.
    pub fn restore(&self, id: Uuid) -> Option<&str> {
        self.entries
            .iter()
            .find(|snapshot| snapshot.id == id)
            .map(|snapshot| snapshot.content.as_str())
    }

    /// Most recently recorded snapshot, if any.
    pub fn latest(&self) -> Option<&VersionSnapshot> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionSnapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<VersionSnapshot> {
        self.entries.iter().cloned().collect()
    }

    fn trim(&mut self) {
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }
}
