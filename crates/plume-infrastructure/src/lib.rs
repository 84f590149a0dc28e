pub mod json_draft_repository;
pub mod memory_draft_repository;
pub mod paths;

pub use crate::json_draft_repository::JsonDraftRepository;
pub use crate::memory_draft_repository::MemoryDraftRepository;
