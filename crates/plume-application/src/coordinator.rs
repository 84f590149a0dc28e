//! Section run coordinator.
//!
//! Sequences per-section generations against one shared shred session. A
//! preparation call produces the section batch and mints the composite
//! draft; each completed section folds back into that draft so incremental
//! work is continuously saved. One busy flag serializes section generation
//! system-wide, matching the sequential "generate all" affordance.

use crate::assembler::{AssemblerResult, PendingMap, ResponseAssembler};
use crate::draft_store::DraftStore;
use crate::registry::GenerationRegistry;
use plume_core::error::{PlumeError, Result};
use plume_core::request::GenerationRequest;
use plume_core::section::{SectionBatch, SectionTask, compose_document};
use plume_core::slot::GenerationSlot;
use plume_interaction::GenerationTransport;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

struct SessionState {
    document_name: String,
    sections: Vec<SectionTask>,
    composite_draft_id: String,
}

/// Coordinates shred sessions and their per-section generations.
pub struct SectionRunCoordinator {
    transport: Arc<dyn GenerationTransport>,
    registry: Arc<GenerationRegistry>,
    assembler: ResponseAssembler,
    draft_store: Arc<DraftStore>,
    model: String,
    sessions: RwLock<HashMap<String, SessionState>>,
    /// Session ids that already had their one automatic generate-all pass.
    auto_run_done: RwLock<HashSet<String>>,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SectionRunCoordinator {
    /// Creates a coordinator.
    pub fn new(
        transport: Arc<dyn GenerationTransport>,
        registry: Arc<GenerationRegistry>,
        draft_store: Arc<DraftStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            registry,
            assembler: ResponseAssembler::new(PendingMap::default()),
            draft_store,
            model: model.into(),
            sessions: RwLock::new(HashMap::new()),
            auto_run_done: RwLock::new(HashSet::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// Replaces the assembler (tests shorten the settle interval).
    pub fn with_assembler(mut self, assembler: ResponseAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Prepares a shred session for an uploaded document.
    ///
    /// One-shot call; the returned batch reflects any automatic generate-all
    /// pass that ran for a fresh session.
    pub async fn prepare(&self, file_name: &str) -> Result<SectionBatch> {
        let batch = self.transport.prepare_shred(file_name).await?;
        info!(
            session_id = %batch.session_id,
            sections = batch.sections.len(),
            "shred session prepared"
        );
        self.register_batch(batch.clone(), file_name).await?;

        let session_id = batch.session_id;
        Ok(SectionBatch {
            sections: self.sections(&session_id).await.unwrap_or_default(),
            session_id,
        })
    }

    /// Registers a section batch for a session.
    ///
    /// Idempotent per session id: re-registering the same session (a
    /// re-render without new data) changes nothing and never re-triggers the
    /// automatic run. The very first non-empty batch for a session with no
    /// pre-existing section drafts runs generate-all exactly once.
    pub async fn register_batch(&self, batch: SectionBatch, document_name: &str) -> Result<()> {
        let session_id = batch.session_id.clone();
        let should_auto_run = {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&session_id) {
                return Ok(());
            }

            // The composite draft id is minted once, here, and stays stable
            // for the session's lifetime.
            let composite = self
                .draft_store
                .save(None, document_name, compose_document(&batch.sections))
                .await?;

            let fresh = !batch.sections.is_empty() && !batch.has_any_draft();
            sessions.insert(
                session_id.clone(),
                SessionState {
                    document_name: document_name.to_string(),
                    sections: batch.sections,
                    composite_draft_id: composite.id,
                },
            );
            fresh
        };

        if should_auto_run {
            // Check-and-mark before dispatch so a concurrent registration
            // cannot double-fire.
            let newly_marked = self.auto_run_done.write().await.insert(session_id.clone());
            if newly_marked {
                debug!(session_id = %session_id, "auto-running all sections");
                self.generate_all(&session_id).await?;
            }
        }

        Ok(())
    }

    /// Generates one section.
    ///
    /// Only one section may generate at a time system-wide; a second call
    /// while one is running fails with [`PlumeError::Busy`]. On success the
    /// section's draft updates and the composite draft is re-saved.
    pub async fn generate(&self, session_id: &str, index: usize) -> Result<()> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PlumeError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        let request = self.section_request(session_id, index).await?;
        let slot = request.slot.clone();

        let guard = self.registry.start(&slot).await;
        self.assembler.begin(&guard).await;
        let events = self.transport.stream_generation(&request).await;
        let result = self.assembler.drive(&guard, events).await;

        let outcome = match result {
            AssemblerResult::Cancelled => {
                debug!(slot = %slot, "section generation superseded");
                return Ok(());
            }
            AssemblerResult::Completed(outcome) => outcome,
        };

        if !guard.is_live() {
            return Ok(());
        }

        // Commit while the slot is still held; release it only afterwards so
        // a cancel can never land between release and write.
        let result = match outcome.error.clone() {
            Some(error) => {
                warn!(slot = %slot, error = %error, "section generation failed");
                self.registry.record_failure(request).await;
                Err(error)
            }
            None => {
                self.commit_section(session_id, index, outcome.message.content)
                    .await
            }
        };
        self.registry.finish(&guard).await;
        result
    }

    /// Generates every section of the session, in index order, awaiting each
    /// fully before starting the next. Per-section failures are logged and
    /// skipped so one bad section does not strand the rest.
    pub async fn generate_all(&self, session_id: &str) -> Result<()> {
        let indices: Vec<usize> = {
            let sessions = self.sessions.read().await;
            let state = sessions
                .get(session_id)
                .ok_or_else(|| PlumeError::not_found("shred session", session_id))?;
            let mut indices: Vec<usize> = state.sections.iter().map(|s| s.index).collect();
            indices.sort_unstable();
            indices
        };

        for index in indices {
            if let Err(error) = self.generate(session_id, index).await {
                warn!(session_id, index, error = %error, "section skipped");
            }
        }
        Ok(())
    }

    /// Current section tasks for a session.
    pub async fn sections(&self, session_id: &str) -> Option<Vec<SectionTask>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|state| state.sections.clone())
    }

    /// The stable composite draft id for a session.
    pub async fn composite_draft_id(&self, session_id: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|state| state.composite_draft_id.clone())
    }

    /// The pending map for in-flight section generations.
    pub fn pending(&self) -> &PendingMap {
        self.assembler.pending()
    }

    async fn section_request(&self, session_id: &str, index: usize) -> Result<GenerationRequest> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .ok_or_else(|| PlumeError::not_found("shred session", session_id))?;
        let section = state
            .sections
            .iter()
            .find(|s| s.index == index)
            .ok_or_else(|| PlumeError::not_found("section", index.to_string()))?;

        let mut content = format!("Draft the \"{}\" section.", section.title);
        if !section.requirement_ids.is_empty() {
            content.push_str(&format!(
                "\nRequirements: {}",
                section.requirement_ids.join(", ")
            ));
        }
        if !section.rfp_excerpt.is_empty() {
            content.push_str(&format!("\nRFP excerpt:\n{}", section.rfp_excerpt));
        }
        if !section.history_excerpt.is_empty() {
            content.push_str(&format!("\nPrior proposals:\n{}", section.history_excerpt));
        }

        Ok(GenerationRequest::new(
            GenerationSlot::section(session_id, index),
            content,
            self.model.clone(),
        ))
    }

    async fn commit_section(&self, session_id: &str, index: usize, draft: String) -> Result<()> {
        let (composite_id, document_name, composite) = {
            let mut sessions = self.sessions.write().await;
            let state = sessions
                .get_mut(session_id)
                .ok_or_else(|| PlumeError::not_found("shred session", session_id))?;
            if let Some(section) = state.sections.iter_mut().find(|s| s.index == index) {
                section.draft = draft;
            }
            (
                state.composite_draft_id.clone(),
                state.document_name.clone(),
                compose_document(&state.sections),
            )
        };

        self.draft_store
            .save(Some(&composite_id), document_name, composite)
            .await?;
        debug!(session_id, index, "section committed to composite draft");
        Ok(())
    }
}
