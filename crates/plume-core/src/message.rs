//! Conversation message types.
//!
//! This module contains types for representing committed messages in a
//! conversation transcript, plus the reserved content markers the
//! materializer and error normalizer rely on.

use serde::{Deserialize, Serialize};

/// Prefix marking internal acknowledgement messages.
///
/// Messages carrying this prefix are bookkeeping between the client and the
/// generation service and are filtered out of the rendered transcript.
pub const ACK_MARKER: &str = "[[ack]]";

/// Glyph guaranteed to lead every error-flavored message body.
pub const ERROR_GLYPH: char = '⚠';

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

/// A single committed message in a conversation history.
///
/// Committed messages are immutable once appended; transcript ordering is
/// append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format).
    pub timestamp: String,
}

impl ConversationMessage {
    /// Creates a message timestamped now.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Creates a user message timestamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message timestamped now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// True if this is an internal acknowledgement message.
    pub fn is_acknowledgement(&self) -> bool {
        self.content.starts_with(ACK_MARKER)
    }

    /// True if the content carries the error glyph prefix.
    pub fn is_error_flavored(&self) -> bool {
        self.content.starts_with(ERROR_GLYPH)
    }
}

/// Normalizes an error payload into a human-readable message body.
///
/// Guarantees the leading error glyph; falls back to a generic message when
/// the payload is blank.
pub fn normalize_error_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return format!("{ERROR_GLYPH} Something went wrong. Please try again.");
    }
    if trimmed.starts_with(ERROR_GLYPH) {
        trimmed.to_string()
    } else {
        format!("{ERROR_GLYPH} {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledgement_detection() {
        let ack = ConversationMessage::assistant(format!("{ACK_MARKER} received"));
        assert!(ack.is_acknowledgement());
        let normal = ConversationMessage::assistant("Hello");
        assert!(!normal.is_acknowledgement());
    }

    #[test]
    fn test_normalize_error_text_adds_glyph() {
        assert_eq!(normalize_error_text("quota exceeded"), "⚠ quota exceeded");
    }

    #[test]
    fn test_normalize_error_text_keeps_existing_glyph() {
        assert_eq!(normalize_error_text("⚠ already marked"), "⚠ already marked");
    }

    #[test]
    fn test_normalize_error_text_blank_fallback() {
        let text = normalize_error_text("   ");
        assert!(text.starts_with(ERROR_GLYPH));
        assert!(text.len() > 2);
    }
}
