//! Incremental codebase indexing and semantic retrieval.
//!
//! Pipeline: the walker enumerates project files, the chunker splits each file
//! into heuristic semantic units, every chunk is embedded through an
//! [`vellum_llm::EmbeddingProvider`] and persisted in an [`store::EmbeddingStore`]
//! under a content-addressed id. Search embeds the query the same way and ranks
//! every stored vector by dot product.

pub mod chunker;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod record;
pub mod search;
pub mod service;
pub mod stats;
pub mod store;
pub mod walker;
pub mod watcher;

pub use error::{IndexError, Result};
pub use service::{IndexService, ServiceConfig};
