//! Project indexing orchestrator: walk → chunk → embed → store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use vellum_llm::EmbeddingProvider;

use crate::chunker::{Chunk, ChunkerConfig, chunk_file};
use crate::error::{IndexError, Result};
use crate::record::{EmbeddingRecord, content_hash};
use crate::stats::ProcessingStats;
use crate::store::EmbeddingStore;
use crate::walker::{FileFilter, FileRecord, WalkOptions, relative_path, walk};

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub walk: WalkOptions,
    pub chunker: ChunkerConfig,
    /// Chunks of one file embedded concurrently (default: 1).
    pub embed_concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            walk: WalkOptions::default(),
            chunker: ChunkerConfig::default(),
            embed_concurrency: 1,
        }
    }
}

/// Orchestrates indexing of one project root into a store.
pub struct CodeIndexer<P, S> {
    root: PathBuf,
    store: Arc<S>,
    provider: Arc<P>,
    config: IndexerConfig,
}

impl<P: EmbeddingProvider, S: EmbeddingStore> CodeIndexer<P, S> {
    #[must_use]
    pub fn new(root: PathBuf, store: Arc<S>, provider: Arc<P>, config: IndexerConfig) -> Self {
        Self {
            root,
            store,
            provider,
            config,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Incremental run over the whole project.
    ///
    /// Files whose stored records are newer than their mtime are skipped, as are
    /// files whose content hash is unchanged. Records of files that no longer
    /// exist are removed unless the run was cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be enumerated or the store fails.
    /// Per-file and per-chunk failures are collected in the returned stats.
    pub async fn index_project(&self, cancel: &CancellationToken) -> Result<ProcessingStats> {
        let mut stats = ProcessingStats::start();

        let root = self.root.clone();
        let options = self.config.walk.clone();
        let files = tokio::task::spawn_blocking(move || walk(&root, &options))
            .await
            .map_err(|e| IndexError::Other(format!("walk task failed: {e}")))??;

        let total = files.len();
        stats.total_files = total;
        tracing::info!(root = %self.root.display(), total, "indexing started");

        let mut current_files: HashSet<&str> = HashSet::with_capacity(total);
        for (i, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                tracing::info!(
                    progress = format_args!("{i}/{total}"),
                    "indexing cancelled"
                );
                break;
            }
            current_files.insert(&file.rel_path);
            self.process_file(file, false, &mut stats).await?;
            tracing::debug!(file = %file.rel_path, progress = format_args!("{}/{total}", i + 1));
        }

        if !stats.cancelled {
            for old_file in self.store.indexed_paths().await? {
                if !current_files.contains(old_file.as_str()) {
                    let removed = self.store.delete_by_path(&old_file).await?;
                    tracing::info!(file = %old_file, removed, "dropped records of vanished file");
                    stats.removed_files += 1;
                }
            }
        }

        let stats = stats.finish();
        tracing::info!(
            processed = stats.processed_files,
            skipped = stats.skipped_files,
            removed = stats.removed_files,
            chunks = stats.processed_chunks,
            errors = stats.errors.len(),
            "indexing finished"
        );
        Ok(stats)
    }

    /// Drop every record, then run a full index.
    ///
    /// # Errors
    ///
    /// Same as [`Self::index_project`].
    pub async fn rebuild(&self, cancel: &CancellationToken) -> Result<ProcessingStats> {
        let cleared = self.store.clear().await?;
        tracing::info!(cleared, "index cleared for rebuild");
        self.index_project(cancel).await
    }

    /// Re-index one file regardless of its mtime (watcher path).
    ///
    /// A missing file, or one now excluded by the walk options or size limit,
    /// has its records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn reindex_file(&self, abs_path: &Path) -> Result<ProcessingStats> {
        let mut stats = ProcessingStats::start();
        let filter = FileFilter::new(&self.config.walk);

        let file = match FileRecord::from_path(&self.root, abs_path) {
            Ok(file) if file.abs_path.is_file() => Some(file),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                stats.record_error(format!("{}: {e}", abs_path.display()));
                return Ok(stats.finish());
            }
        };

        match file {
            Some(file)
                if filter.accepts_path(&self.root, abs_path) && filter.accepts_size(file.size) =>
            {
                stats.total_files = 1;
                self.process_file(&file, true, &mut stats).await?;
            }
            _ => {
                let rel_path = relative_path(&self.root, abs_path);
                if self.store.delete_by_path(&rel_path).await? > 0 {
                    tracing::info!(file = %rel_path, "forgot file");
                    stats.removed_files = 1;
                }
            }
        }
        Ok(stats.finish())
    }

    async fn process_file(
        &self,
        file: &FileRecord,
        force: bool,
        stats: &mut ProcessingStats,
    ) -> Result<()> {
        let rel_path = file.rel_path.as_str();
        let state = self.store.path_state(rel_path).await?;

        if !force
            && let Some(state) = &state
            && state.file_hash.is_some()
            && file.modified <= state.oldest_update
        {
            tracing::debug!(file = %rel_path, "up to date");
            stats.skipped_files += 1;
            return Ok(());
        }

        let source = match tokio::fs::read_to_string(&file.abs_path).await {
            Ok(source) => source,
            Err(e) => {
                stats.record_error(format!("{rel_path}: {e}"));
                return Ok(());
            }
        };

        let file_hash = content_hash(&source);
        if let Some(state) = &state
            && state.file_hash.as_deref() == Some(file_hash.as_str())
        {
            self.store.touch_path(rel_path).await?;
            tracing::debug!(file = %rel_path, "content unchanged");
            stats.skipped_files += 1;
            return Ok(());
        }

        let chunks = chunk_file(Path::new(rel_path), &source, &self.config.chunker);
        if chunks.is_empty() {
            if state.is_some() {
                self.store.replace_path(rel_path, Vec::new()).await?;
                stats.processed_files += 1;
            } else {
                stats.skipped_files += 1;
            }
            tracing::debug!(file = %rel_path, "no chunks");
            return Ok(());
        }

        let chunk_count = chunks.len();
        let embedded = self.embed_chunks(chunks).await;

        let mut pending = Vec::with_capacity(chunk_count);
        for (index, (chunk, result)) in embedded.into_iter().enumerate() {
            match result {
                Ok(vector) => pending.push((index, chunk, vector)),
                Err(e) => stats.record_error(format!(
                    "{rel_path}: chunk {index} (lines {}-{}): {e}",
                    chunk.metadata.line_start, chunk.metadata.line_end
                )),
            }
        }

        let complete = pending.len() == chunk_count;
        let stored_hash = if complete { file_hash.as_str() } else { "" };
        let records: Vec<EmbeddingRecord> = pending
            .into_iter()
            .map(|(index, chunk, vector)| {
                EmbeddingRecord::new(rel_path, index, chunk, stored_hash, vector)
            })
            .collect();
        let stored = records.len();
        self.store.replace_path(rel_path, records).await?;

        stats.total_chunks += chunk_count;
        stats.processed_chunks += stored;
        if stored > 0 {
            stats.processed_files += 1;
        }
        tracing::info!(file = %rel_path, chunks = chunk_count, stored, "indexed");
        Ok(())
    }

    async fn embed_chunks(
        &self,
        chunks: Vec<Chunk>,
    ) -> Vec<(Chunk, std::result::Result<Vec<f32>, vellum_llm::LlmError>)> {
        let provider = &self.provider;
        futures::stream::iter(chunks.into_iter().map(|chunk| async move {
            let result = provider.embed(&chunk.text).await;
            (chunk, result)
        }))
        .buffered(self.config.embed_concurrency.max(1))
        .collect()
        .await
    }
}

#[cfg(test)]
mod tests {
    use vellum_llm::mock::MockEmbedder;

    use super::*;
    use crate::store::InMemoryStore;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn indexer(root: &Path) -> (CodeIndexer<MockEmbedder, InMemoryStore>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let indexer = CodeIndexer::new(
            root.to_path_buf(),
            Arc::clone(&store),
            Arc::new(MockEmbedder::new()),
            IndexerConfig::default(),
        );
        (indexer, store)
    }

    const GREETER: &str = "\
function greet(name: string): string {
  return `Hello, ${name}`;
}

interface User {
  id: number;
  name: string;
}
";

    #[test]
    fn default_config() {
        let config = IndexerConfig::default();
        assert_eq!(config.embed_concurrency, 1);
        assert_eq!(config.chunker.window_lines, 50);
    }

    #[tokio::test]
    async fn indexes_function_and_interface() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/greet.ts", GREETER);
        let (indexer, store) = indexer(dir.path());

        let stats = indexer.index_project(&CancellationToken::new()).await.unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.processed_files, 1);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.processed_chunks, 2);
        assert!(stats.errors.is_empty());
        assert!(stats.finished_at.is_some());

        let records = store.get_by_path("src/greet.ts").await.unwrap();
        let kinds: Vec<&str> = records.iter().map(|r| r.metadata.kind.as_str()).collect();
        assert_eq!(kinds, vec!["function", "interface"]);
        assert!(records.iter().all(|r| !r.file_hash.is_empty()));
    }

    #[tokio::test]
    async fn second_run_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/greet.ts", GREETER);
        let (indexer, _store) = indexer(dir.path());
        let cancel = CancellationToken::new();

        indexer.index_project(&cancel).await.unwrap();
        let stats = indexer.index_project(&cancel).await.unwrap();
        assert_eq!(stats.processed_files, 0);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.processed_chunks, 0);
    }

    #[tokio::test]
    async fn unreadable_file_is_a_per_file_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.ts", GREETER);
        std::fs::write(dir.path().join("binary.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let (indexer, _store) = indexer(dir.path());

        let stats = indexer.index_project(&CancellationToken::new()).await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.processed_files, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("binary.txt"));
    }

    #[tokio::test]
    async fn missing_root_aborts() {
        let (indexer, _store) = indexer(Path::new("/nonexistent/vellum/project"));
        let err = indexer.index_project(&CancellationToken::new()).await;
        assert!(matches!(err, Err(IndexError::Walk(_))));
    }

    #[tokio::test]
    async fn reindex_file_forgets_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/greet.ts", GREETER);
        let (indexer, store) = indexer(dir.path());
        indexer.index_project(&CancellationToken::new()).await.unwrap();

        let path = dir.path().join("src/greet.ts");
        std::fs::remove_file(&path).unwrap();
        let stats = indexer.reindex_file(&path).await.unwrap();
        assert_eq!(stats.removed_files, 1);
        assert!(store.get_by_path("src/greet.ts").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reindex_file_picks_up_new_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/greet.ts", GREETER);
        let (indexer, store) = indexer(dir.path());
        indexer.index_project(&CancellationToken::new()).await.unwrap();

        write(
            dir.path(),
            "src/greet.ts",
            "export function farewell(name: string) {\n  return `Bye, ${name}`;\n}\n",
        );
        let stats = indexer
            .reindex_file(&dir.path().join("src/greet.ts"))
            .await
            .unwrap();
        assert_eq!(stats.processed_files, 1);
        let records = store.get_by_path("src/greet.ts").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.name.as_deref(), Some("farewell"));
    }

    #[tokio::test]
    async fn concurrent_embedding_preserves_chunk_order() {
        let dir = tempfile::tempdir().unwrap();
        let text: String = (0..200)
            .map(|i| format!("line {i} with some plain tabular data\n"))
            .collect();
        write(dir.path(), "table.dat", &text);
        let store = Arc::new(InMemoryStore::new());
        let indexer = CodeIndexer::new(
            dir.path().to_path_buf(),
            Arc::clone(&store),
            Arc::new(MockEmbedder::new()),
            IndexerConfig {
                embed_concurrency: 4,
                ..IndexerConfig::default()
            },
        );

        indexer.index_project(&CancellationToken::new()).await.unwrap();
        let records = store.get_by_path("table.dat").await.unwrap();
        let starts: Vec<usize> = records.iter().map(|r| r.metadata.line_start).collect();
        assert_eq!(starts, vec![1, 51, 101, 151]);
    }
}
