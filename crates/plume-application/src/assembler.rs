//! Phased response assembler.
//!
//! Folds one generation event stream into the per-slot pending map and
//! produces the committed outcome. The phase machine:
//!
//! - `accumulating` (default): final-channel deltas append to visible content.
//! - `analysis`: analysis-channel deltas render as a reasoning trace while
//!   the final buffer accumulates silently underneath.
//! - `thinking`: entered when final content starts arriving during analysis;
//!   the buffered content is held back for one settle interval, then revealed.
//! - `final`: deltas append to visible content live.
//! - `error`: terminal, content replaced by a normalized error string.
//!
//! Every mutation of the shared pending map is guarded by the loop's own
//! liveness check so a superseded loop cannot clobber its successor's state.

use crate::registry::GenerationGuard;
use futures::StreamExt;
use plume_core::error::PlumeError;
use plume_core::event::{Channel, StreamEvent};
use plume_core::message::{ConversationMessage, normalize_error_text};
use plume_core::pending::{PendingResponse, ResponsePhase};
use plume_core::slot::GenerationSlot;
use plume_interaction::EventStream;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Shared map of in-flight responses, one entry per active slot.
pub type PendingMap = Arc<RwLock<HashMap<GenerationSlot, PendingResponse>>>;

/// Settle interval between `thinking` and `final`, the non-UI equivalent of
/// one rendering frame.
const SETTLE_INTERVAL: Duration = Duration::from_millis(16);

/// The committed result of one completed generation loop.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Message to commit to the transcript (error-flavored on failure).
    pub message: ConversationMessage,
    /// Tabular rows delivered by `row` events and the terminal payload.
    pub rows: Vec<serde_json::Value>,
    /// File references delivered during the stream.
    pub files: Vec<String>,
    /// Phases the pending record passed through, in order.
    pub phase_history: Vec<ResponsePhase>,
    /// Why the generation failed, when it did.
    pub error: Option<PlumeError>,
}

impl GenerationOutcome {
    /// True when the generation committed normal content.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of driving one event stream to completion.
#[derive(Debug)]
pub enum AssemblerResult {
    /// The stream ran to its end; the outcome says whether it succeeded.
    Completed(GenerationOutcome),
    /// The loop was superseded or cancelled; nothing was committed and the
    /// pending map was left to the successor.
    Cancelled,
}

/// Folds event streams into pending state and committed outcomes.
#[derive(Clone)]
pub struct ResponseAssembler {
    pending: PendingMap,
    settle_interval: Duration,
}

impl ResponseAssembler {
    /// Creates an assembler over the given pending map.
    pub fn new(pending: PendingMap) -> Self {
        Self {
            pending,
            settle_interval: SETTLE_INTERVAL,
        }
    }

    /// Overrides the settle interval (tests).
    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// The pending map this assembler writes through.
    pub fn pending(&self) -> &PendingMap {
        &self.pending
    }

    /// Installs a fresh pending record for the guard's slot.
    ///
    /// Called on loop start; the record replaces any stale one left by a
    /// superseded loop. The liveness check happens under the write lock: a
    /// loop that lost its slot between registration and here must not
    /// replace the successor's record.
    pub async fn begin(&self, guard: &GenerationGuard) {
        let mut pending = self.pending.write().await;
        if !guard.is_live() {
            return;
        }
        pending.insert(guard.slot().clone(), PendingResponse::new());
    }

    /// Drives one event stream to completion.
    ///
    /// Processes events strictly in delivery order. Suspends only at stream
    /// reads and at the settle boundary; after every suspension the guard's
    /// liveness decides whether any further shared state may be touched.
    pub async fn drive(
        &self,
        guard: &GenerationGuard,
        mut events: EventStream,
    ) -> AssemblerResult {
        let slot = guard.slot().clone();
        let mut analysis_buffer = String::new();
        let mut final_buffer = String::new();
        let mut phase = ResponsePhase::Accumulating;
        let mut phase_history = vec![phase];
        let mut rows = Vec::new();
        let mut files = Vec::new();
        let mut stream_error: Option<String> = None;
        let mut done: Option<plume_core::event::DonePayload> = None;

        while let Some(event) = events.next().await {
            if !guard.is_live() {
                return AssemblerResult::Cancelled;
            }

            match event {
                StreamEvent::Init => {}
                StreamEvent::Delta { content, channel } => match channel {
                    Channel::Analysis => {
                        analysis_buffer.push_str(&content);
                        if matches!(phase, ResponsePhase::Accumulating | ResponsePhase::Analysis) {
                            if phase != ResponsePhase::Analysis {
                                phase = ResponsePhase::Analysis;
                                phase_history.push(phase);
                            }
                            self.update_pending(guard, &slot, &analysis_buffer, phase).await;
                        }
                    }
                    Channel::Final => {
                        final_buffer.push_str(&content);
                        match phase {
                            ResponsePhase::Analysis => {
                                // Hold the buffered answer back behind a
                                // placeholder for one settle interval, then
                                // reveal it. A fixed wall-clock delay here
                                // would show stale analysis and flicker.
                                phase = ResponsePhase::Thinking;
                                phase_history.push(phase);
                                self.update_pending(guard, &slot, "", phase).await;

                                tokio::time::sleep(self.settle_interval).await;
                                if !guard.is_live() {
                                    return AssemblerResult::Cancelled;
                                }

                                phase = ResponsePhase::Final;
                                phase_history.push(phase);
                                self.update_pending(guard, &slot, &final_buffer, phase).await;
                            }
                            ResponsePhase::Accumulating | ResponsePhase::Final => {
                                self.update_pending(guard, &slot, &final_buffer, phase).await;
                            }
                            // Held-back content stays behind the placeholder
                            // until the reveal; buffer only.
                            ResponsePhase::Thinking => {}
                            ResponsePhase::Error => {}
                        }
                    }
                },
                StreamEvent::Row { row } => rows.push(row),
                StreamEvent::File { name } => files.push(name),
                StreamEvent::Error { message } => {
                    phase = ResponsePhase::Error;
                    phase_history.push(phase);
                    let normalized = normalize_error_text(&message);
                    self.update_pending(guard, &slot, &normalized, phase).await;
                    stream_error = Some(message);
                }
                StreamEvent::Done(payload) => {
                    done = Some(payload);
                    break;
                }
            }
        }

        if !guard.is_live() {
            return AssemblerResult::Cancelled;
        }

        let outcome = conclude(final_buffer, rows, files, phase_history, stream_error, done);
        self.clear_pending(guard, &slot).await;
        debug!(slot = %slot, success = outcome.is_success(), "generation concluded");
        AssemblerResult::Completed(outcome)
    }

    async fn update_pending(
        &self,
        guard: &GenerationGuard,
        slot: &GenerationSlot,
        content: &str,
        phase: ResponsePhase,
    ) {
        if !guard.is_live() {
            return;
        }
        let mut pending = self.pending.write().await;
        if let Some(entry) = pending.get_mut(slot) {
            entry.content = content.to_string();
            entry.phase = phase;
        }
    }

    async fn clear_pending(&self, guard: &GenerationGuard, slot: &GenerationSlot) {
        if !guard.is_live() {
            return;
        }
        self.pending.write().await.remove(slot);
    }
}

/// Classifies the terminal state into a committed outcome.
///
/// An in-band error always wins, even when followed by a well-formed `done`.
/// A stream exhausted without `done` is "ended unexpectedly". A completed
/// stream with nothing usable in the buffer or terminal echo is an empty
/// result. Everything else commits as a normal assistant message.
fn conclude(
    final_buffer: String,
    mut rows: Vec<serde_json::Value>,
    files: Vec<String>,
    phase_history: Vec<ResponsePhase>,
    stream_error: Option<String>,
    done: Option<plume_core::event::DonePayload>,
) -> GenerationOutcome {
    let saw_done = done.is_some();
    let done_payload = done.unwrap_or_default();
    if let Some(payload_rows) = done_payload.rows {
        rows.extend(payload_rows);
    }

    // Prefer the accumulated buffer; fall back to the terminal echo.
    let content = if final_buffer.trim().is_empty() {
        done_payload.text.unwrap_or_default()
    } else {
        final_buffer
    };

    let error = if let Some(message) = stream_error {
        Some(PlumeError::Generation(message))
    } else if !saw_done {
        Some(PlumeError::StreamEndedUnexpectedly)
    } else if content.trim().is_empty() {
        Some(PlumeError::EmptyResult)
    } else {
        None
    };

    let message = match &error {
        Some(err) => ConversationMessage::assistant(normalize_error_text(&err.to_string())),
        None => ConversationMessage::assistant(content),
    };

    GenerationOutcome {
        message,
        rows,
        files,
        phase_history,
        error,
    }
}
