//! Conversation materialization and the chat service.
//!
//! [`materialize`] is the single source of render truth: a pure function of
//! committed history and the optional pending record. [`ChatService`] owns
//! per-slot histories, wires the registry and assembler around a transport
//! stream, and commits outcomes.

use crate::assembler::{AssemblerResult, GenerationOutcome, PendingMap, ResponseAssembler};
use crate::registry::GenerationRegistry;
use plume_core::error::{PlumeError, Result};
use plume_core::message::ConversationMessage;
use plume_core::pending::PendingResponse;
use plume_core::request::GenerationRequest;
use plume_core::slot::GenerationSlot;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// One entry in the rendered transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    /// A committed, immutable message.
    Committed(ConversationMessage),
    /// The in-flight response, always last when present.
    Pending(PendingResponse),
}

/// Merges committed history with the pending record into the render list.
///
/// Internal acknowledgement messages are filtered out. The function is pure;
/// callers with unchanged inputs get an equal list, so unrelated re-renders
/// do not disturb scroll arbitration.
pub fn materialize(
    committed: &[ConversationMessage],
    pending: Option<&PendingResponse>,
) -> Vec<TranscriptEntry> {
    let mut entries: Vec<TranscriptEntry> = committed
        .iter()
        .filter(|message| !message.is_acknowledgement())
        .cloned()
        .map(TranscriptEntry::Committed)
        .collect();

    if let Some(pending) = pending {
        entries.push(TranscriptEntry::Pending(pending.clone()));
    }

    entries
}

/// Drives chat, matrix, and shred generations for their slots.
pub struct ChatService {
    transport: Arc<dyn plume_interaction::GenerationTransport>,
    registry: Arc<GenerationRegistry>,
    assembler: ResponseAssembler,
    histories: Arc<RwLock<HashMap<GenerationSlot, Vec<ConversationMessage>>>>,
}

impl ChatService {
    /// Creates a chat service over the given transport and registry.
    pub fn new(
        transport: Arc<dyn plume_interaction::GenerationTransport>,
        registry: Arc<GenerationRegistry>,
    ) -> Self {
        Self {
            transport,
            registry,
            assembler: ResponseAssembler::new(PendingMap::default()),
            histories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replaces the assembler (tests shorten the settle interval).
    pub fn with_assembler(mut self, assembler: ResponseAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Committed history for a slot.
    pub async fn history(&self, slot: &GenerationSlot) -> Vec<ConversationMessage> {
        self.histories
            .read()
            .await
            .get(slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Current pending record for a slot, if a generation is in flight.
    pub async fn pending_for(&self, slot: &GenerationSlot) -> Option<PendingResponse> {
        self.assembler.pending().read().await.get(slot).cloned()
    }

    /// Materialized transcript for a slot.
    pub async fn transcript(&self, slot: &GenerationSlot) -> Vec<TranscriptEntry> {
        let histories = self.histories.read().await;
        let committed = histories.get(slot).map(Vec::as_slice).unwrap_or(&[]);
        let pending = self.assembler.pending().read().await;
        materialize(committed, pending.get(slot))
    }

    /// Sends a user message and drives the generation to completion.
    ///
    /// Returns `Ok(None)` when the loop was superseded by a newer `send` on
    /// the same slot. On failure the error-flavored message is already
    /// committed and the request descriptor retained for retry.
    pub async fn send(&self, request: GenerationRequest) -> Result<Option<GenerationOutcome>> {
        self.append(&request.slot, ConversationMessage::user(&request.content))
            .await;
        self.dispatch(request).await
    }

    /// Resubmits the last failed request verbatim.
    ///
    /// Goes through the same start path as `send`, so any stray prior loop
    /// on the slot is cancelled first. The original user message is already
    /// committed and is not appended again.
    pub async fn retry_last_failed(&self) -> Result<Option<GenerationOutcome>> {
        let request = self
            .registry
            .take_last_failed()
            .await
            .ok_or_else(|| PlumeError::not_found("failed request", "last"))?;
        debug!(slot = %request.slot, "retrying last failed request");
        self.dispatch(request).await
    }

    /// Cancels any in-flight generation for the slot and clears its pending
    /// record.
    pub async fn cancel(&self, slot: &GenerationSlot) {
        self.registry.cancel(slot).await;
        self.assembler.pending().write().await.remove(slot);
    }

    async fn dispatch(&self, request: GenerationRequest) -> Result<Option<GenerationOutcome>> {
        let slot = request.slot.clone();
        let guard = self.registry.start(&slot).await;
        self.assembler.begin(&guard).await;

        let events = self.transport.stream_generation(&request).await;
        let result = self.assembler.drive(&guard, events).await;

        let outcome = match result {
            AssemblerResult::Cancelled => {
                debug!(slot = %slot, "generation superseded");
                return Ok(None);
            }
            AssemblerResult::Completed(outcome) => outcome,
        };

        // Commit only while still the current loop for the slot; a
        // cancellation racing the terminal event must not write history.
        if !guard.is_live() {
            return Ok(None);
        }
        self.append(&slot, outcome.message.clone()).await;
        self.registry.finish(&guard).await;

        if let Some(error) = outcome.error.clone() {
            warn!(slot = %slot, error = %error, "generation failed");
            self.registry.record_failure(request).await;
            return Err(error);
        }
        Ok(Some(outcome))
    }

    async fn append(&self, slot: &GenerationSlot, message: ConversationMessage) {
        self.histories
            .write()
            .await
            .entry(slot.clone())
            .or_default()
            .push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::message::{ACK_MARKER, MessageRole};
    use plume_core::pending::ResponsePhase;

    fn committed(role: MessageRole, content: &str) -> ConversationMessage {
        ConversationMessage::new(role, content)
    }

    #[test]
    fn test_materialize_filters_acknowledgements() {
        let history = vec![
            committed(MessageRole::User, "hello"),
            committed(MessageRole::Assistant, &format!("{ACK_MARKER} noted")),
            committed(MessageRole::Assistant, "hi there"),
        ];
        let entries = materialize(&history, None);
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            &entries[1],
            TranscriptEntry::Committed(m) if m.content == "hi there"
        ));
    }

    #[test]
    fn test_materialize_appends_pending_last() {
        let history = vec![committed(MessageRole::User, "hello")];
        let mut pending = PendingResponse::new();
        pending.content = "typing".to_string();
        pending.phase = ResponsePhase::Final;

        let entries = materialize(&history, Some(&pending));
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            entries.last().unwrap(),
            TranscriptEntry::Pending(p) if p.content == "typing"
        ));
    }

    #[test]
    fn test_materialize_is_stable_for_equal_inputs() {
        let history = vec![committed(MessageRole::User, "hello")];
        assert_eq!(materialize(&history, None), materialize(&history, None));
    }
}
