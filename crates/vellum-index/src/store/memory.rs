use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;

use super::{EmbeddingStore, PathState, StoreStats};
use crate::error::{IndexError, Result};
use crate::record::EmbeddingRecord;

/// Volatile store keyed by record id.
pub struct InMemoryStore {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, EmbeddingRecord>>> {
        self.records
            .read()
            .map_err(|e| IndexError::Store(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, EmbeddingRecord>>> {
        self.records
            .write()
            .map_err(|e| IndexError::Store(e.to_string()))
    }

    fn sorted(mut records: Vec<EmbeddingRecord>) -> Vec<EmbeddingRecord> {
        records.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        records
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl EmbeddingStore for InMemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, mut record: EmbeddingRecord) -> Result<()> {
        let mut records = self.write()?;
        if let Some(existing) = records.get(&record.id) {
            record.created_at = existing.created_at;
        }
        record.updated_at = Utc::now();
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_by_path(&self, path: &str) -> Result<Vec<EmbeddingRecord>> {
        let records = self.read()?;
        Ok(Self::sorted(
            records
                .values()
                .filter(|r| r.file_path == path)
                .cloned()
                .collect(),
        ))
    }

    async fn delete_by_path(&self, path: &str) -> Result<u64> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, r| r.file_path != path);
        Ok((before - records.len()) as u64)
    }

    async fn scan_all(&self) -> Result<Vec<EmbeddingRecord>> {
        let records = self.read()?;
        Ok(Self::sorted(records.values().cloned().collect()))
    }

    async fn clear(&self) -> Result<u64> {
        let mut records = self.write()?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn replace_path(&self, path: &str, new_records: Vec<EmbeddingRecord>) -> Result<()> {
        let now = Utc::now();
        let mut records = self.write()?;
        let mut created = HashMap::new();
        records.retain(|id, r| {
            if r.file_path == path {
                created.insert(id.clone(), r.created_at);
                false
            } else {
                true
            }
        });
        for mut record in new_records {
            if let Some(created_at) = created.get(&record.id) {
                record.created_at = *created_at;
            }
            record.updated_at = now;
            records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn indexed_paths(&self) -> Result<Vec<String>> {
        let records = self.read()?;
        let paths: BTreeSet<&str> = records.values().map(|r| r.file_path.as_str()).collect();
        Ok(paths.into_iter().map(str::to_owned).collect())
    }

    async fn touch_path(&self, path: &str) -> Result<u64> {
        let now = Utc::now();
        let mut records = self.write()?;
        let mut touched = 0u64;
        for record in records.values_mut().filter(|r| r.file_path == path) {
            record.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn path_state(&self, path: &str) -> Result<Option<PathState>> {
        let records = self.read()?;
        let group: Vec<&EmbeddingRecord> =
            records.values().filter(|r| r.file_path == path).collect();
        let Some(oldest_update) = group.iter().map(|r| r.updated_at).min() else {
            return Ok(None);
        };
        let first_hash = &group[0].file_hash;
        let file_hash = (!first_hash.is_empty() && group.iter().all(|r| &r.file_hash == first_hash))
            .then(|| first_hash.clone());
        Ok(Some(PathState {
            oldest_update,
            file_hash,
            records: group.len() as u64,
        }))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let records = self.read()?;
        let unique: BTreeSet<&str> = records.values().map(|r| r.file_path.as_str()).collect();
        let size_bytes: usize = records
            .values()
            .map(|r| r.id.len() + r.file_path.len() + r.content.len() + r.vector.len() * 4)
            .sum();
        Ok(StoreStats {
            total_embeddings: records.len() as u64,
            unique_files: unique.len() as u64,
            size_bytes: size_bytes as u64,
        })
    }
}
