//! Draft repository trait.
//!
//! Defines the interface for draft persistence operations.

use super::model::Draft;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for the durable draft collection.
///
/// This trait decouples the draft store from the specific storage mechanism
/// (a JSON file on disk, in-memory for tests). Implementations must tolerate
/// absent or corrupt storage on load by returning an empty collection rather
/// than failing.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// Loads the full draft collection.
    ///
    /// Missing or corrupt storage yields `Ok(vec![])`.
    async fn load_all(&self) -> Result<Vec<Draft>>;

    /// Persists the full draft collection, replacing the stored one.
    async fn save_all(&self, drafts: &[Draft]) -> Result<()>;
}
