//! Draft store service.
//!
//! Process-wide collection of named drafts over a [`DraftRepository`]. Every
//! mutation writes through to the repository immediately so drafts survive
//! reloads regardless of what any generation loop does afterwards.

use plume_core::draft::{Draft, DraftRepository};
use plume_core::error::{PlumeError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory draft collection persisted through a repository.
pub struct DraftStore {
    repository: Arc<dyn DraftRepository>,
    drafts: RwLock<Vec<Draft>>,
}

impl DraftStore {
    /// Loads the store from the repository.
    ///
    /// Missing or corrupt storage starts the collection empty; the
    /// repository contract guarantees that path never fails.
    pub async fn load(repository: Arc<dyn DraftRepository>) -> Result<Self> {
        let drafts = repository.load_all().await?;
        debug!(count = drafts.len(), "draft store loaded");
        Ok(Self {
            repository,
            drafts: RwLock::new(drafts),
        })
    }

    /// Creates or merges a draft.
    ///
    /// With a known `id`, fields merge into the existing entry: `content`
    /// and `name` update, `updated_at` refreshes, `created_at` and the id
    /// itself are preserved. Otherwise a new entry with a freshly generated
    /// id is inserted.
    pub async fn save(
        &self,
        id: Option<&str>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Draft> {
        let name = name.into();
        let content = content.into();

        let saved = {
            let mut drafts = self.drafts.write().await;
            let existing = id.and_then(|id| drafts.iter_mut().find(|d| d.id == id));
            match existing {
                Some(draft) => {
                    draft.merge(name, content);
                    draft.clone()
                }
                None => {
                    let draft = Draft::new(name, content);
                    drafts.push(draft.clone());
                    draft
                }
            }
        };

        self.persist().await?;
        Ok(saved)
    }

    /// Renames a draft.
    pub async fn rename(&self, id: &str, name: impl Into<String>) -> Result<Draft> {
        let renamed = {
            let mut drafts = self.drafts.write().await;
            let draft = drafts
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| PlumeError::not_found("draft", id))?;
            draft.name = name.into();
            draft.updated_at = chrono::Utc::now().to_rfc3339();
            draft.clone()
        };

        self.persist().await?;
        Ok(renamed)
    }

    /// Deletes a draft.
    ///
    /// Callers holding derived renditions for the id reconcile against
    /// [`DraftStore::ids`] afterwards.
    pub async fn delete(&self, id: &str) -> Result<()> {
        {
            let mut drafts = self.drafts.write().await;
            let before = drafts.len();
            drafts.retain(|d| d.id != id);
            if drafts.len() == before {
                return Err(PlumeError::not_found("draft", id));
            }
        }

        self.persist().await
    }

    /// Returns one draft by id.
    pub async fn get(&self, id: &str) -> Option<Draft> {
        self.drafts.read().await.iter().find(|d| d.id == id).cloned()
    }

    /// Returns all drafts, most recently updated first.
    pub async fn list(&self) -> Vec<Draft> {
        let mut drafts = self.drafts.read().await.clone();
        drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        drafts
    }

    /// The set of live draft ids.
    pub async fn ids(&self) -> HashSet<String> {
        self.drafts.read().await.iter().map(|d| d.id.clone()).collect()
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.drafts.read().await.clone();
        self.repository.save_all(&snapshot).await
    }
}
