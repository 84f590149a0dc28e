//! JSON file-backed draft repository.
//!
//! The whole draft collection is stored as one JSON document, the durable
//! key-value slot the UI's draft store reads on init and writes through on
//! every mutation. Load tolerates a missing or corrupt file by returning an
//! empty collection so a bad disk state never locks the user out of drafts.

use crate::paths::PlumePaths;
use async_trait::async_trait;
use plume_core::draft::{Draft, DraftRepository};
use plume_core::error::{PlumeError, Result};
use std::path::PathBuf;
use tracing::warn;

/// Draft repository persisting to a single JSON file.
#[derive(Clone)]
pub struct JsonDraftRepository {
    file_path: PathBuf,
}

impl JsonDraftRepository {
    /// Creates a repository at the default platform path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn new() -> Result<Self> {
        let file_path = PlumePaths::drafts_file()
            .map_err(|err| PlumeError::config(err.to_string()))?;
        Ok(Self { file_path })
    }

    /// Creates a repository at an explicit path (used by tests).
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

#[async_trait]
impl DraftRepository for JsonDraftRepository {
    async fn load_all(&self) -> Result<Vec<Draft>> {
        let content = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(path = ?self.file_path, error = %err, "failed to read draft storage, starting empty");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_str::<Vec<Draft>>(&content) {
            Ok(drafts) => Ok(drafts),
            Err(err) => {
                warn!(path = ?self.file_path, error = %err, "draft storage corrupt, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save_all(&self, drafts: &[Draft]) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                PlumeError::data_access(format!(
                    "Failed to create draft storage directory {parent:?}: {err}"
                ))
            })?;
        }

        let serialized = serde_json::to_string_pretty(drafts)?;
        tokio::fs::write(&self.file_path, serialized)
            .await
            .map_err(|err| {
                PlumeError::data_access(format!(
                    "Failed to write draft storage {:?}: {err}",
                    self.file_path
                ))
            })?;
        Ok(())
    }
}
