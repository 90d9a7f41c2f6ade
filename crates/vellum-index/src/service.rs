//! Long-lived facade that owns the indexer, store and embedding provider.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use vellum_llm::EmbeddingProvider;

use crate::error::{IndexError, Result};
use crate::indexer::{CodeIndexer, IndexerConfig};
use crate::record::EmbeddingRecord;
use crate::search::{self, SearchHit};
use crate::stats::ProcessingStats;
use crate::store::{EmbeddingStore, StoreStats};
use crate::walker::relative_path;

/// Everything the service needs besides its provider and store.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root: PathBuf,
    pub indexer: IndexerConfig,
}

impl ServiceConfig {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            indexer: IndexerConfig::default(),
        }
    }
}

/// Indexing and retrieval for one project root.
///
/// Construct once with [`IndexService::initialize`] and share the returned
/// handle. Indexing runs, rebuilds, clears and single-file re-indexes are
/// serialized; searches and lookups run alongside them.
pub struct IndexService<P, S> {
    indexer: CodeIndexer<P, S>,
    store: Arc<S>,
    provider: Arc<P>,
    run_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl<P: EmbeddingProvider, S: EmbeddingStore> IndexService<P, S> {
    /// Validate the configuration and prepare the store.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Config` if the root is empty or not a directory,
    /// an I/O error if it cannot be canonicalized, or a store error if
    /// initialization fails.
    pub async fn initialize(config: ServiceConfig, provider: P, store: S) -> Result<Arc<Self>> {
        if config.root.as_os_str().is_empty() {
            return Err(IndexError::Config("project root is required".into()));
        }
        if !config.root.is_dir() {
            return Err(IndexError::Config(format!(
                "project root {} is not a directory",
                config.root.display()
            )));
        }

        // Absolute paths from callers and the watcher are matched against it.
        let root = tokio::fs::canonicalize(&config.root).await?;

        store.init().await?;

        let store = Arc::new(store);
        let provider = Arc::new(provider);
        tracing::info!(
            root = %root.display(),
            provider = provider.name(),
            "index service ready"
        );
        Ok(Arc::new(Self {
            indexer: CodeIndexer::new(
                root,
                Arc::clone(&store),
                Arc::clone(&provider),
                config.indexer,
            ),
            store,
            provider,
            run_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.indexer.root()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    #[must_use]
    pub fn indexer_config(&self) -> &IndexerConfig {
        self.indexer.config()
    }

    /// A run token that is also cancelled by [`Self::shutdown`].
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Incremental index of the whole project.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be enumerated or the store fails.
    pub async fn process_codebase(&self) -> Result<ProcessingStats> {
        self.process_codebase_with(&self.cancellation_token()).await
    }

    /// Like [`Self::process_codebase`], stopping at the next file boundary once
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be enumerated or the store fails.
    pub async fn process_codebase_with(&self, cancel: &CancellationToken) -> Result<ProcessingStats> {
        let _guard = self.run_lock.lock().await;
        self.indexer.index_project(cancel).await
    }

    /// Clear the store and index everything from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be enumerated or the store fails.
    pub async fn rebuild(&self) -> Result<ProcessingStats> {
        let _guard = self.run_lock.lock().await;
        self.indexer.rebuild(&self.cancellation_token()).await
    }

    /// Top-`limit` chunks most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the store fails.
    pub async fn search_similar(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        search::search_similar(&*self.store, &*self.provider, query, limit).await
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn get_stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    /// Records for `path`, which may be absolute or relative to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn get_embeddings_by_path(&self, path: &str) -> Result<Vec<EmbeddingRecord>> {
        self.store.get_by_path(&self.normalize_path(path)).await
    }

    /// Forget everything about `path`, returning the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn delete_embeddings_by_path(&self, path: &str) -> Result<u64> {
        let path = self.normalize_path(path);
        let removed = self.store.delete_by_path(&path).await?;
        tracing::info!(file = %path, removed, "deleted embeddings");
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn clear_all_embeddings(&self) -> Result<u64> {
        let _guard = self.run_lock.lock().await;
        let removed = self.store.clear().await?;
        tracing::info!(removed, "cleared all embeddings");
        Ok(removed)
    }

    /// Re-embed a single file, or forget it if it no longer qualifies.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn reindex_file(&self, path: &Path) -> Result<ProcessingStats> {
        let abs_path = if path.is_absolute() {
            self.resolve_absolute(path)
        } else {
            self.root().join(path)
        };
        let _guard = self.run_lock.lock().await;
        self.indexer.reindex_file(&abs_path).await
    }

    /// Cancel in-flight runs, wait for them to stop and close the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to close.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();
        let _guard = self.run_lock.lock().await;
        self.store.close().await?;
        tracing::info!("index service shut down");
        Ok(())
    }

    fn normalize_path(&self, path: &str) -> String {
        let path = path.replace('\\', "/");
        if Path::new(&path).is_absolute() {
            return relative_path(self.root(), &self.resolve_absolute(Path::new(&path)));
        }
        path.trim_start_matches("./").to_owned()
    }

    /// Spell an absolute path the way the canonical root is spelled
    /// (symlinked temp dirs, `..` segments). Missing files resolve through
    /// their deepest existing ancestor.
    fn resolve_absolute(&self, path: &Path) -> PathBuf {
        if path.starts_with(self.root())
            && !path.components().any(|c| c == Component::ParentDir)
        {
            return path.to_path_buf();
        }
        let mut missing = Vec::new();
        let mut current = path;
        loop {
            if let Ok(mut resolved) = std::fs::canonicalize(current) {
                resolved.extend(missing.iter().rev());
                return resolved;
            }
            match (current.parent(), current.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    current = parent;
                }
                _ => return path.to_path_buf(),
            }
        }
    }
}
