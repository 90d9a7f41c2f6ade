//! Embedding and chat clients for a local Ollama-compatible model server.
//!
//! The embedding client is the only network dependency of the indexing engine:
//! every vector it returns is already unit-normalized, so similarity scoring
//! downstream is a plain dot product.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod vector;

pub use error::LlmError;
pub use provider::{ChatProvider, EmbeddingProvider};
