//! Draft domain model.
//!
//! A draft is a named, persisted, user-editable text artifact. Drafts outlive
//! the generation sessions that produce them: discarding a chat or a section
//! run never deletes a previously saved draft.

use serde::{Deserialize, Serialize};

/// A named, persisted text artifact.
///
/// `id` is assigned once at creation and never changes across edits or
/// merges. Content updates refresh `updated_at` and preserve `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Unique draft identifier (UUID format).
    pub id: String,
    /// Human-readable draft name.
    pub name: String,
    /// Draft body text.
    pub content: String,
    /// Timestamp when the draft was created (ISO 8601 format).
    pub created_at: String,
    /// Timestamp when the draft was last updated (ISO 8601 format).
    pub updated_at: String,
}

impl Draft {
    /// Creates a new draft with a freshly generated id, timestamped now.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            content: content.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Merges new fields into this draft, preserving id and `created_at`.
    pub fn merge(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.name = name.into();
        self.content = content.into();
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft_has_matching_timestamps() {
        let draft = Draft::new("Proposal", "body");
        assert!(!draft.id.is_empty());
        assert_eq!(draft.created_at, draft.updated_at);
    }

    #[test]
    fn test_merge_preserves_identity_and_created_at() {
        let mut draft = Draft::new("A", "x");
        let id = draft.id.clone();
        let created = draft.created_at.clone();
        draft.merge("A2", "y");
        assert_eq!(draft.id, id);
        assert_eq!(draft.created_at, created);
        assert_eq!(draft.name, "A2");
        assert_eq!(draft.content, "y");
    }
}
