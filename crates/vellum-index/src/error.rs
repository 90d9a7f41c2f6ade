//! Error types for vellum-index.

use std::num::TryFromIntError;

/// Errors that can occur during indexing, storage, or search.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `SQLite` database error.
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Llm(#[from] vellum_llm::LlmError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory traversal error.
    #[error("traversal error: {0}")]
    Ignore(#[from] ignore::Error),

    /// File watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// Invalid or missing configuration, raised before any I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// The project root could not be enumerated.
    #[error("walk failed: {0}")]
    Walk(String),

    /// Stored vector bytes do not decode.
    #[error("vector codec error: {0}")]
    Codec(String),

    /// In-memory store lock was poisoned.
    #[error("store error: {0}")]
    Store(String),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
