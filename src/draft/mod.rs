//! Draft data model and editing subsystems.
//!
//! A draft is the working copy of one case document. Everything a session
//! needs to survive a process restart is collected in [`DraftState`], which
//! is what the durable store persists as a single JSON aggregate per case
//! identifier.

pub mod changes;
pub mod comments;
pub mod history;
pub mod sanitize;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a version snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveReason {
    /// Explicit user save.
    Manual,
    /// Periodic autosave of unsaved edits.
    Auto,
    /// Freshly imported generator output.
    Ai,
}

impl SaveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
            Self::Ai => "ai",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "auto" => Some(Self::Auto),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

/// Immutable, reason-tagged copy of draft content at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub id: Uuid,
    pub content: String,
    pub saved_at: DateTime<Utc>,
    pub reason: SaveReason,
}

/// Direction of a tracked edit delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
        }
    }
}

/// One recorded edit delta while change tracking is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub id: Uuid,
    pub kind: ChangeKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Inline annotation anchored to a text fragment.
///
/// The anchor is the selected text captured at creation time, not a live
/// position, so it stays meaningful across serialization and reload even
/// after the surrounding content has shifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub anchor_text: String,
    pub body: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// The persisted per-case aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftState {
    /// Sanitized HTML. Never raw externally supplied markup.
    pub content: String,
    /// Version snapshots, newest last.
    #[serde(default)]
    pub history: Vec<VersionSnapshot>,
    pub last_saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub change_log: Vec<ChangeEntry>,
}
