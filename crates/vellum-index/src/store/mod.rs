//! Keyed persistence of [`EmbeddingRecord`]s behind a narrow async trait.
//!
//! The backend is picked at compile time through generics: [`SqliteStore`] for
//! durable indexes, [`InMemoryStore`] for tests and throwaway sessions.

mod memory;
mod sqlite;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::record::EmbeddingRecord;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// What the store knows about one indexed path, used for freshness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathState {
    /// Oldest `updated_at` among the path's records.
    pub oldest_update: DateTime<Utc>,
    /// Shared file hash of all records, `None` if any record lacks one or they disagree.
    pub file_hash: Option<String>,
    pub records: u64,
}

/// Aggregate store size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_embeddings: u64,
    pub unique_files: u64,
    pub size_bytes: u64,
}

impl StoreStats {
    /// Size rendered with a 1024 base, e.g. `12.3 KB`.
    #[must_use]
    pub fn size_human(&self) -> String {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        if self.size_bytes < 1024 {
            return format!("{} B", self.size_bytes);
        }
        #[allow(clippy::cast_precision_loss)]
        let mut size = self.size_bytes as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Storage contract for embedding records.
///
/// All records sharing a `file_path` form one group that can be read, replaced,
/// or deleted together. After `delete_by_path(p)`, neither `get_by_path(p)` nor
/// `scan_all` returns a record for `p`.
pub trait EmbeddingStore: Send + Sync {
    /// Prepare the backing storage (schema, directories).
    fn init(&self) -> impl Future<Output = Result<()>> + Send;

    /// Release backend resources. The store is unusable afterwards.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;

    /// Upsert by id; keeps the original `created_at`, stamps `updated_at = now`.
    fn put(&self, record: EmbeddingRecord) -> impl Future<Output = Result<()>> + Send;

    /// Records for `path`, ordered by chunk index.
    fn get_by_path(&self, path: &str)
    -> impl Future<Output = Result<Vec<EmbeddingRecord>>> + Send;

    /// Remove every record for `path`, returning how many were removed.
    fn delete_by_path(&self, path: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Every record, ordered by path then chunk index.
    fn scan_all(&self) -> impl Future<Output = Result<Vec<EmbeddingRecord>>> + Send;

    /// Remove all records, returning how many were removed.
    fn clear(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Atomically swap the record group for `path` with `records`.
    ///
    /// Records whose id already existed keep their `created_at`.
    fn replace_path(
        &self,
        path: &str,
        records: Vec<EmbeddingRecord>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Distinct paths that have at least one record.
    fn indexed_paths(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Bump `updated_at` on every record for `path`.
    fn touch_path(&self, path: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Freshness summary for `path`, `None` if nothing is stored.
    fn path_state(&self, path: &str) -> impl Future<Output = Result<Option<PathState>>> + Send;

    fn stats(&self) -> impl Future<Output = Result<StoreStats>> + Send;
}
