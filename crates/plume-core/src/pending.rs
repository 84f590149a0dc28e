//! In-flight response representation.
//!
//! A [`PendingResponse`] exists only while a generation loop for its slot is
//! running. It is stored in a per-slot map (never a single ambient value) and
//! removed when the loop terminates, whether by success, error, or
//! cancellation.

use serde::{Deserialize, Serialize};

/// The assembler's current interpretation of in-flight content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePhase {
    /// Default phase: final-channel deltas append to visible content.
    Accumulating,
    /// Analysis-channel deltas are shown as a reasoning trace while the
    /// final buffer accumulates silently underneath.
    Analysis,
    /// Final content has started arriving during analysis; content is held
    /// back behind a placeholder for one settle interval.
    Thinking,
    /// Buffered content revealed; subsequent deltas append live.
    Final,
    /// Terminal: content replaced by a normalized error string.
    Error,
}

/// The mutable in-flight record for one active slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResponse {
    /// Visible content for the current phase.
    pub content: String,
    /// Current phase tag.
    pub phase: ResponsePhase,
    /// Timestamp when the generation started (ISO 8601 format).
    pub timestamp: String,
}

impl PendingResponse {
    /// Creates a fresh pending record in the default phase.
    pub fn new() -> Self {
        Self {
            content: String::new(),
            phase: ResponsePhase::Accumulating,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl Default for PendingResponse {
    fn default() -> Self {
        Self::new()
    }
}
