//! Generation session registry.
//!
//! Tracks at most one active generation loop per slot. Starting a new loop
//! for an occupied slot cancels the prior loop's token first, so a superseded
//! loop observes cancellation at its next liveness check and stops mutating
//! shared state. Slots are independent: cancelling one never affects another.
//!
//! The registry also retains the descriptor of the last failed request so the
//! caller can resubmit it verbatim through the normal start path.

use plume_core::request::GenerationRequest;
use plume_core::slot::GenerationSlot;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct ActiveEntry {
    token: CancellationToken,
    generation: u64,
}

/// Handle to one generation loop's lifetime.
///
/// The loop owning this guard must check [`GenerationGuard::is_live`] before
/// every mutation of shared state after a suspension point. The check is tied
/// to the loop's own token, not a global flag, so concurrent slots stay
/// independent.
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    slot: GenerationSlot,
    token: CancellationToken,
    generation: u64,
}

impl GenerationGuard {
    /// The slot this loop is bound to.
    pub fn slot(&self) -> &GenerationSlot {
        &self.slot
    }

    /// True while this loop is still the current one for its slot.
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Tracks active generation loops and the last failed request.
#[derive(Default)]
pub struct GenerationRegistry {
    active: RwLock<HashMap<GenerationSlot, ActiveEntry>>,
    last_failed: RwLock<Option<GenerationRequest>>,
    next_generation: AtomicU64,
}

impl GenerationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new loop to the slot, cancelling any prior loop bound to it.
    pub async fn start(&self, slot: &GenerationSlot) -> GenerationGuard {
        let mut active = self.active.write().await;
        if let Some(prior) = active.remove(slot) {
            debug!(slot = %slot, "cancelling superseded generation");
            prior.token.cancel();
        }

        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        active.insert(
            slot.clone(),
            ActiveEntry {
                token: token.clone(),
                generation,
            },
        );

        GenerationGuard {
            slot: slot.clone(),
            token,
            generation,
        }
    }

    /// Cancels the loop bound to the slot, if any. Idempotent.
    pub async fn cancel(&self, slot: &GenerationSlot) {
        let mut active = self.active.write().await;
        if let Some(entry) = active.remove(slot) {
            debug!(slot = %slot, "generation cancelled");
            entry.token.cancel();
        }
    }

    /// Releases the slot when the guard's loop terminates.
    ///
    /// A superseded guard releases nothing: the slot already belongs to a
    /// newer loop.
    pub async fn finish(&self, guard: &GenerationGuard) {
        let mut active = self.active.write().await;
        if let Some(entry) = active.get(&guard.slot) {
            if entry.generation == guard.generation {
                active.remove(&guard.slot);
            }
        }
    }

    /// True if a loop is currently bound to the slot.
    pub async fn is_active(&self, slot: &GenerationSlot) -> bool {
        self.active.read().await.contains_key(slot)
    }

    /// Retains a failed request descriptor for later resubmission.
    pub async fn record_failure(&self, request: GenerationRequest) {
        *self.last_failed.write().await = Some(request);
    }

    /// Takes the retained failed request, clearing it.
    pub async fn take_last_failed(&self) -> Option<GenerationRequest> {
        self.last_failed.write().await.take()
    }

    /// Reads the retained failed request without clearing it.
    pub async fn peek_last_failed(&self) -> Option<GenerationRequest> {
        self.last_failed.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_cancels_prior_loop_on_same_slot() {
        let registry = GenerationRegistry::new();
        let slot = GenerationSlot::chat("c1");

        let first = registry.start(&slot).await;
        assert!(first.is_live());

        let second = registry.start(&slot).await;
        assert!(!first.is_live());
        assert!(second.is_live());
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let registry = GenerationRegistry::new();
        let chat = registry.start(&GenerationSlot::chat("c1")).await;
        let section = registry.start(&GenerationSlot::section("s1", 0)).await;

        registry.cancel(&GenerationSlot::chat("c1")).await;
        assert!(!chat.is_live());
        assert!(section.is_live());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let registry = GenerationRegistry::new();
        let slot = GenerationSlot::matrix("doc.pdf");
        let guard = registry.start(&slot).await;

        registry.cancel(&slot).await;
        registry.cancel(&slot).await;
        assert!(!guard.is_live());
        assert!(!registry.is_active(&slot).await);
    }

    #[tokio::test]
    async fn test_finish_by_stale_guard_leaves_new_loop_active() {
        let registry = GenerationRegistry::new();
        let slot = GenerationSlot::chat("c1");

        let stale = registry.start(&slot).await;
        let _current = registry.start(&slot).await;

        registry.finish(&stale).await;
        assert!(registry.is_active(&slot).await);
    }

    #[tokio::test]
    async fn test_last_failed_round_trip() {
        let registry = GenerationRegistry::new();
        let request =
            GenerationRequest::new(GenerationSlot::chat("c1"), "tell me more", "gpt-4o");

        registry.record_failure(request.clone()).await;
        assert_eq!(registry.peek_last_failed().await, Some(request.clone()));
        assert_eq!(registry.take_last_failed().await, Some(request));
        assert!(registry.take_last_failed().await.is_none());
    }
}
