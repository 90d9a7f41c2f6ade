//! Debounced file watcher that keeps the index in step with the working tree.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use tokio::sync::mpsc;
use vellum_llm::EmbeddingProvider;

use crate::error::Result;
use crate::service::IndexService;
use crate::store::EmbeddingStore;
use crate::walker::FileFilter;

const DEBOUNCE: Duration = Duration::from_secs(1);

/// Re-indexes changed files and forgets removed ones until dropped.
pub struct IndexWatcher {
    handle: tokio::task::JoinHandle<()>,
}

impl IndexWatcher {
    /// Watch the service's root recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem watcher cannot be initialized.
    pub fn start<P, S>(service: Arc<IndexService<P, S>>) -> Result<Self>
    where
        P: EmbeddingProvider + 'static,
        S: EmbeddingStore + 'static,
    {
        let root = service.root().to_path_buf();
        let filter = FileFilter::new(&service.indexer_config().walk);
        let (notify_tx, mut notify_rx) = mpsc::channel::<PathBuf>(64);

        let event_root = root.clone();
        let mut debouncer = new_debouncer(
            DEBOUNCE,
            move |events: std::result::Result<Vec<DebouncedEvent>, notify::Error>| {
                let events = match events {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!("index watcher error: {e}");
                        return;
                    }
                };

                let paths: HashSet<PathBuf> = events
                    .into_iter()
                    .filter(|e| {
                        e.kind == DebouncedEventKind::Any
                            && filter.accepts_path(&event_root, &e.path)
                    })
                    .map(|e| e.path)
                    .collect();

                for path in paths {
                    if notify_tx.blocking_send(path).is_err() {
                        return;
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&root, notify::RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching for changes");

        let handle = tokio::spawn(async move {
            let _debouncer = debouncer;
            while let Some(path) = notify_rx.recv().await {
                match service.reindex_file(&path).await {
                    Ok(stats) => {
                        for error in &stats.errors {
                            tracing::debug!(path = %path.display(), "{error}");
                        }
                    }
                    Err(e) => tracing::warn!(path = %path.display(), "reindex failed: {e}"),
                }
            }
        });

        Ok(Self { handle })
    }

    /// Stop watching.
    pub fn stop(self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for IndexWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
