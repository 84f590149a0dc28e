//! Orchestration layer for in-flight generation.
//!
//! This crate multiplexes incremental generation streams into durable,
//! user-editable artifacts: per-slot generation lifecycle ([`registry`]),
//! event folding with phase tracking ([`assembler`]), transcript
//! materialization ([`conversation`]), viewport arbitration ([`scroll`]),
//! persisted drafts ([`draft_store`]), derived renditions ([`rendition`]),
//! and sequenced per-section runs ([`coordinator`]).

pub mod assembler;
pub mod conversation;
pub mod coordinator;
pub mod draft_store;
pub mod registry;
pub mod rendition;
pub mod scroll;

pub use assembler::{AssemblerResult, GenerationOutcome, PendingMap, ResponseAssembler};
pub use conversation::{ChatService, TranscriptEntry, materialize};
pub use coordinator::SectionRunCoordinator;
pub use draft_store::DraftStore;
pub use registry::{GenerationGuard, GenerationRegistry};
pub use rendition::{Rendition, RenditionCache};
pub use scroll::{ScrollArbiter, ScrollDirective};
