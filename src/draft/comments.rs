//! Inline comment management.
//!
//! Anchors are the selected text captured at creation time, not live
//! positions, so they remain meaningful after the draft is serialized,
//! persisted, and reloaded in a different session. Comments are never
//! deleted; resolution is the only mutation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Comment;

#[derive(Debug, Default)]
pub struct CommentSet {
    entries: Vec<Comment>,
}

impl CommentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comments(entries: Vec<Comment>) -> Self {
        Self { entries }
    }

    /// Create a comment anchored to the given text fragment.
    pub fn add(&mut self, anchor_text: &str, body: &str, created_at: DateTime<Utc>) -> Comment {
        let comment = Comment {
            id: Uuid::new_v4(),
            anchor_text: anchor_text.to_string(),
            body: body.to_string(),
            resolved: false,
            created_at,
        };
        self.entries.push(comment.clone());
        comment
    }

    /// Flip the resolved flag on exactly the comment with the given id.
    /// Returns false (and changes nothing) when the id is unknown.
    pub fn toggle_resolved(&mut self, id: Uuid) -> bool {
        match self.entries.iter_mut().find(|c| c.id == id) {
            Some(comment) => {
                comment.resolved = !comment.resolved;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unresolved_count(&self) -> usize {
        self.entries.iter().filter(|c| !c.resolved).count()
    }

    pub fn to_vec(&self) -> Vec<Comment> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn toggle_flips_exactly_one_comment() {
        let mut comments = CommentSet::new();
        let first = comments.add("the parties", "Define 'parties' earlier.", Utc::now());
        let second = comments.add("Exhibit B", "Missing from the filing.", Utc::now());

        assert!(comments.toggle_resolved(first.id));

        let resolved: Vec<_> = comments.iter().map(|c| c.resolved).collect();
        assert_eq!(resolved, vec![true, false]);
        assert_eq!(comments.unresolved_count(), 1);
        let _ = second;
    }

    #[test]
    fn double_toggle_restores_original_state() {
        let mut comments = CommentSet::new();
        let comment = comments.add("hereinafter", "Archaic; simplify.", Utc::now());

        assert!(comments.toggle_resolved(comment.id));
        assert!(comments.toggle_resolved(comment.id));
        assert!(!comments.iter().next().expect("comment present").resolved);
    }

    #[test]
    fn toggle_of_unknown_id_is_a_noop() {
        let mut comments = CommentSet::new();
        comments.add("anchor", "body", Utc::now());
        let before = comments.to_vec();

        assert!(!comments.toggle_resolved(Uuid::new_v4()));
        assert_eq!(comments.to_vec(), before);
    }
}
