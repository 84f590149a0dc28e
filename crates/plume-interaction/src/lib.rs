//! Boundary to the remote generation service.
//!
//! Defines the [`transport::GenerationTransport`] contract the orchestrator
//! consumes and provides the HTTP implementation over reqwest.

pub mod http;
pub mod transport;

pub use http::HttpGenerationTransport;
pub use transport::{EventStream, GenerationTransport, RenditionKind, TransportConfig};
