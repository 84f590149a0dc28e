//! Generation transport contract.
//!
//! The orchestrator never talks HTTP directly; it consumes this trait so
//! tests can script event sequences with `futures::stream::iter`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use plume_core::error::Result;
use plume_core::event::StreamEvent;
use plume_core::request::GenerationRequest;
use plume_core::section::SectionBatch;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// A lazy, single-consumer sequence of decoded stream events.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Target form for a draft export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenditionKind {
    /// Print-ready PDF.
    Pdf,
    /// Editable Word document.
    Docx,
}

impl RenditionKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Contract for the remote generation service.
///
/// Implementations must never fail mid-stream: transport problems surface as
/// a terminal [`StreamEvent::Error`] inside the returned sequence so callers
/// degrade gracefully. Retry is a caller-level decision.
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Starts one generation and returns its event sequence.
    ///
    /// Each server-delivered increment yields exactly one event, in delivery
    /// order. The consumer may stop iterating early without error.
    async fn stream_generation(&self, request: &GenerationRequest) -> EventStream;

    /// One-shot preparation call splitting a document into section tasks.
    async fn prepare_shred(&self, file_name: &str) -> Result<SectionBatch>;

    /// Converts draft content into a downloadable rendition.
    ///
    /// Failures carry the service's plain-text error body.
    async fn export_rendition(&self, content: &str, kind: RenditionKind) -> Result<Vec<u8>>;
}

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 30;

/// Transport configuration.
///
/// `from_env` reads `PLUME_API_BASE_URL` and `PLUME_MODEL`, falling back to
/// defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the generation service.
    pub base_url: String,
    /// Default model selector for requests that do not override it.
    pub model: String,
    /// How long the document-chat bootstrap waits for a response to begin.
    pub bootstrap_timeout: Duration,
}

impl TransportConfig {
    /// Loads configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("PLUME_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: env::var("PLUME_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            bootstrap_timeout: Duration::from_secs(DEFAULT_BOOTSTRAP_TIMEOUT_SECS),
        }
    }

    /// Overrides the base URL after construction.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the bootstrap timeout after construction.
    pub fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = timeout;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            bootstrap_timeout: Duration::from_secs(DEFAULT_BOOTSTRAP_TIMEOUT_SECS),
        }
    }
}
