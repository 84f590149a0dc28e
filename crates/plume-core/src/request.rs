//! Generation request descriptor.

use crate::slot::GenerationSlot;
use serde::{Deserialize, Serialize};

/// One outbound generation request.
///
/// The registry retains the descriptor of the last failed request verbatim so
/// the caller can resubmit it through the normal start path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The slot this request is bound to.
    pub slot: GenerationSlot,
    /// User (or system) payload driving the generation.
    pub content: String,
    /// Model selector passed through to the service.
    pub model: String,
    /// Optional scoping list of source file names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_files: Vec<String>,
}

impl GenerationRequest {
    /// Creates a request with no source-file scoping.
    pub fn new(
        slot: GenerationSlot,
        content: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            slot,
            content: content.into(),
            model: model.into(),
            source_files: Vec::new(),
        }
    }

    /// Scopes the request to the given source files.
    pub fn with_source_files(mut self, files: Vec<String>) -> Self {
        self.source_files = files;
        self
    }
}
