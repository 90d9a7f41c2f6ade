//! Wiring from [`Config`] to a running [`IndexService`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use vellum_index::IndexService;
use vellum_index::store::SqliteStore;
use vellum_llm::ollama::{OllamaChat, OllamaEmbedder};

use crate::config::{Config, DEFAULT_CONFIG_FILE};

/// Service backed by Ollama embeddings and a `SQLite` store.
pub type DefaultService = IndexService<OllamaEmbedder, SqliteStore>;

/// Priority: `--config` > `VELLUM_CONFIG` > `vellum.toml`.
#[must_use]
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("VELLUM_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Log whether the embedding server answers; never fails.
pub async fn health_check(embedder: &OllamaEmbedder) {
    match embedder.health_check().await {
        Ok(()) => tracing::info!(base_url = embedder.base_url(), "ollama health check passed"),
        Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
    }
}

/// Embedding client for the configured endpoint.
#[must_use]
pub fn embedder(config: &Config) -> OllamaEmbedder {
    OllamaEmbedder::new(&config.embedding.base_url, config.embedding.model.clone())
        .with_timeout(Duration::from_secs(config.embedding.timeout_seconds))
}

/// Chat client used by `ask`, sharing the embedding endpoint.
#[must_use]
pub fn chat_client(config: &Config) -> OllamaChat {
    OllamaChat::new(&config.embedding.base_url, config.chat.model.clone())
}

/// Validate the config, open the store and initialize the service.
///
/// # Errors
///
/// Returns an error if the config is invalid, the database cannot be opened
/// or the store schema cannot be created.
pub async fn build_service(config: &Config) -> anyhow::Result<Arc<DefaultService>> {
    config.validate()?;

    let store_path = config.store_path()?;
    let store = SqliteStore::open(&store_path)
        .await
        .with_context(|| format!("failed to open embedding store at {store_path}"))?;

    let service = IndexService::initialize(config.service_config()?, embedder(config), store)
        .await
        .context("failed to initialize index service")?;

    tracing::info!(
        root = %service.root().display(),
        store = %store_path,
        model = %config.embedding.model,
        "index service ready"
    );
    Ok(service)
}
