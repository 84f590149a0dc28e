//! Draft domain model and persistence contract.

pub mod model;
pub mod repository;

pub use model::Draft;
pub use repository::DraftRepository;
