//! Derived-rendition cache.
//!
//! Lazily builds a print/export rendition of a draft's body on first view,
//! keyed by draft id. Concurrent requests for the same id share one in-flight
//! build through an explicit registry of watch channels; completed handles
//! are cached until reconciliation drops ids no longer present in the draft
//! store.

use plume_core::draft::Draft;
use plume_core::error::{PlumeError, Result};
use plume_interaction::{GenerationTransport, RenditionKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, warn};

/// A built rendition of one draft.
#[derive(Debug, Clone)]
pub struct Rendition {
    /// Id of the draft this rendition was built from.
    pub draft_id: String,
    /// Export form of the rendition.
    pub kind: RenditionKind,
    /// Rendition bytes, ready for download.
    pub bytes: Vec<u8>,
    /// Timestamp when the build completed (ISO 8601 format).
    pub built_at: String,
}

type BuildResult = Result<Arc<Rendition>>;

/// Cache of built renditions with in-flight build deduplication.
pub struct RenditionCache {
    transport: Arc<dyn GenerationTransport>,
    kind: RenditionKind,
    ready: RwLock<HashMap<String, Arc<Rendition>>>,
    /// Admission registry: one watch channel per draft id being built.
    in_flight: Mutex<HashMap<String, watch::Receiver<Option<BuildResult>>>>,
}

impl RenditionCache {
    /// Creates a cache building renditions of the given kind.
    pub fn new(transport: Arc<dyn GenerationTransport>, kind: RenditionKind) -> Self {
        Self {
            transport,
            kind,
            ready: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the rendition for a draft, building it on first request.
    ///
    /// If a build for the same id is already in flight, awaits that build's
    /// result instead of starting a duplicate. A failed build clears the
    /// in-flight entry and propagates the error; the draft itself stays
    /// usable for editing.
    pub async fn ensure(&self, draft: &Draft) -> BuildResult {
        // Admission is serialized on the in-flight lock so two callers
        // cannot both decide to build.
        let mut receiver = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(ready) = self.ready.read().await.get(&draft.id) {
                return Ok(ready.clone());
            }

            if let Some(receiver) = in_flight.get(&draft.id) {
                receiver.clone()
            } else {
                let (sender, receiver) = watch::channel(None);
                in_flight.insert(draft.id.clone(), receiver);
                drop(in_flight);
                return self.build(draft, sender).await;
            }
        };

        // Another caller owns the build; wait for it to settle.
        let settled = receiver
            .wait_for(|result| result.is_some())
            .await
            .map_err(|_| PlumeError::export("Rendition build was dropped"))?;
        match settled.clone() {
            Some(result) => result,
            None => Err(PlumeError::export("Rendition build was dropped")),
        }
    }

    /// Drops cached and in-flight entries whose draft id is gone.
    ///
    /// Run after draft deletions to avoid stale handles and unbounded
    /// growth. A build finishing after its draft was deleted re-enters the
    /// ready map briefly; the next reconcile removes it.
    pub async fn reconcile(&self, live_ids: &HashSet<String>) {
        let mut ready = self.ready.write().await;
        let before = ready.len();
        ready.retain(|id, _| live_ids.contains(id));
        if ready.len() != before {
            debug!(removed = before - ready.len(), "reconciled rendition cache");
        }
        drop(ready);

        let mut in_flight = self.in_flight.lock().await;
        in_flight.retain(|id, _| live_ids.contains(id));
    }

    /// Number of cached renditions.
    pub async fn len(&self) -> usize {
        self.ready.read().await.len()
    }

    /// True when nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.ready.read().await.is_empty()
    }

    async fn build(
        &self,
        draft: &Draft,
        sender: watch::Sender<Option<BuildResult>>,
    ) -> BuildResult {
        let result = self
            .transport
            .export_rendition(&draft.content, self.kind)
            .await
            .map(|bytes| {
                Arc::new(Rendition {
                    draft_id: draft.id.clone(),
                    kind: self.kind,
                    bytes,
                    built_at: chrono::Utc::now().to_rfc3339(),
                })
            });

        match &result {
            Ok(rendition) => {
                self.ready
                    .write()
                    .await
                    .insert(draft.id.clone(), rendition.clone());
            }
            Err(error) => {
                warn!(draft_id = %draft.id, error = %error, "rendition build failed");
            }
        }

        // Settle waiters, then clear the busy entry either way.
        let _ = sender.send(Some(result.clone()));
        self.in_flight.lock().await.remove(&draft.id);

        result
    }
}
