//! Persistent embedding record, content-addressed ids, and the vector byte codec.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chunker::{Chunk, ChunkMetadata};
use crate::error::{IndexError, Result};

/// Number of leading content characters that participate in the record id.
pub const ID_CONTENT_PREFIX: usize = 100;

/// One embedded chunk as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRecord {
    pub id: String,
    /// Path relative to the project root, `/`-separated.
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// blake3 of the whole file at indexing time; empty when some chunks of the
    /// file failed to embed, which forces a retry on the next run.
    pub file_hash: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    #[must_use]
    pub fn new(
        file_path: &str,
        chunk_index: usize,
        chunk: Chunk,
        file_hash: &str,
        vector: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: record_id(file_path, chunk_index, &chunk.text),
            file_path: file_path.to_owned(),
            chunk_index,
            content: chunk.text,
            metadata: chunk.metadata,
            file_hash: file_hash.to_owned(),
            vector,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Deterministic id over `(path, chunk index, first 100 chars of content)`.
#[must_use]
pub fn record_id(file_path: &str, chunk_index: usize, content: &str) -> String {
    let prefix_end = content
        .char_indices()
        .nth(ID_CONTENT_PREFIX)
        .map_or(content.len(), |(i, _)| i);

    let mut hasher = blake3::Hasher::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(&content.as_bytes()[..prefix_end]);
    hasher.finalize().to_hex().to_string()
}

/// blake3 hex digest of a whole file's content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Encode a vector as N little-endian `f32`s.
#[must_use]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode N little-endian `f32`s, checking the byte length against `dimensions`.
///
/// # Errors
///
/// Returns `IndexError::Codec` if the length is not a multiple of 4 or does
/// not match `dimensions`.
pub fn decode_vector(bytes: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(IndexError::Codec(format!(
            "vector byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    if bytes.len() / 4 != dimensions {
        return Err(IndexError::Codec(format!(
            "vector has {} floats, expected {dimensions}",
            bytes.len() / 4
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
