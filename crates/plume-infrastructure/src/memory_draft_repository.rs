//! In-memory draft repository.
//!
//! Backs the draft store in tests and ephemeral contexts where nothing
//! should touch the disk.

use async_trait::async_trait;
use plume_core::draft::{Draft, DraftRepository};
use plume_core::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Draft repository holding the collection in memory only.
#[derive(Clone, Default)]
pub struct MemoryDraftRepository {
    drafts: Arc<RwLock<Vec<Draft>>>,
}

impl MemoryDraftRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftRepository for MemoryDraftRepository {
    async fn load_all(&self) -> Result<Vec<Draft>> {
        Ok(self.drafts.read().await.clone())
    }

    async fn save_all(&self, drafts: &[Draft]) -> Result<()> {
        *self.drafts.write().await = drafts.to_vec();
        Ok(())
    }
}
