pub mod draft;
pub mod error;
pub mod event;
pub mod message;
pub mod pending;
pub mod request;
pub mod section;
pub mod slot;

// Re-export common error type
pub use error::PlumeError;
