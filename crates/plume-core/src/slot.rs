//! Generation slot addressing.
//!
//! A slot identifies one addressable generation target. The registry enforces
//! at most one active generation loop per slot; slots for different targets
//! are fully independent and may interleave.

use serde::{Deserialize, Serialize};

/// One addressable generation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationSlot {
    /// An ordinary chat conversation.
    Chat { chat_id: String },
    /// Capability-matrix generation for one source document.
    Matrix { document: String },
    /// Shred/extraction run for one source document.
    Shred { document: String },
    /// One section of a prepared shred session.
    Section { session_id: String, index: usize },
}

impl GenerationSlot {
    /// Creates a chat slot.
    pub fn chat(chat_id: impl Into<String>) -> Self {
        Self::Chat {
            chat_id: chat_id.into(),
        }
    }

    /// Creates a capability-matrix slot for a document.
    pub fn matrix(document: impl Into<String>) -> Self {
        Self::Matrix {
            document: document.into(),
        }
    }

    /// Creates a shred slot for a document.
    pub fn shred(document: impl Into<String>) -> Self {
        Self::Shred {
            document: document.into(),
        }
    }

    /// Creates a slot for one section of a shred session.
    pub fn section(session_id: impl Into<String>, index: usize) -> Self {
        Self::Section {
            session_id: session_id.into(),
            index,
        }
    }
}

impl std::fmt::Display for GenerationSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat { chat_id } => write!(f, "chat:{chat_id}"),
            Self::Matrix { document } => write!(f, "matrix:{document}"),
            Self::Shred { document } => write!(f, "shred:{document}"),
            Self::Section { session_id, index } => write!(f, "section:{session_id}:{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slots_are_distinct_map_keys() {
        let mut set = HashSet::new();
        set.insert(GenerationSlot::chat("c1"));
        set.insert(GenerationSlot::chat("c2"));
        set.insert(GenerationSlot::matrix("c1"));
        set.insert(GenerationSlot::section("s1", 0));
        set.insert(GenerationSlot::section("s1", 1));
        assert_eq!(set.len(), 5);
        assert!(set.contains(&GenerationSlot::chat("c1")));
    }

    #[test]
    fn test_display() {
        assert_eq!(GenerationSlot::section("s1", 2).to_string(), "section:s1:2");
    }
}
