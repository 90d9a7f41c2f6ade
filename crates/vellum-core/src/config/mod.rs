mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use vellum_index::ServiceConfig;
use vellum_index::indexer::IndexerConfig;

/// Database file name inside [`STATE_DIR`].
pub const DEFAULT_DB_FILE: &str = "embeddings.db";

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "vellum.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject configurations the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let root = self.project_root()?;
        if !root.is_dir() {
            bail!("project.root {} is not a directory", root.display());
        }

        let base = url::Url::parse(&self.embedding.base_url)
            .with_context(|| format!("invalid embedding.base_url {:?}", self.embedding.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!("embedding.base_url must use http or https, got {}", base.scheme());
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.embedding.timeout_seconds == 0 {
            bail!("embedding.timeout_seconds must be greater than zero");
        }
        if self.embedding.concurrency == 0 {
            bail!("embedding.concurrency must be greater than zero");
        }
        if self.chunker.window_lines == 0 {
            bail!("chunker.window_lines must be greater than zero");
        }
        if self.chunker.max_size < self.chunker.target_size {
            bail!(
                "chunker.max_size ({}) must not be smaller than chunker.target_size ({})",
                self.chunker.max_size,
                self.chunker.target_size
            );
        }
        Ok(())
    }

    /// Configured project root.
    ///
    /// # Errors
    ///
    /// Returns an error if no root is configured.
    pub fn project_root(&self) -> anyhow::Result<&Path> {
        match self.project.root.as_deref() {
            Some(root) if !root.as_os_str().is_empty() => Ok(root),
            _ => bail!("project.root is required (set it in the config file or VELLUM_PROJECT_ROOT)"),
        }
    }

    /// Database location: `store.path`, or `<root>/.vellum/embeddings.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a store path nor a root is configured.
    pub fn store_path(&self) -> anyhow::Result<String> {
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }
        let path: PathBuf = self.project_root()?.join(STATE_DIR).join(DEFAULT_DB_FILE);
        Ok(path.to_string_lossy().into_owned())
    }

    /// Indexing settings for [`vellum_index::IndexService::initialize`].
    ///
    /// # Errors
    ///
    /// Returns an error if no root is configured.
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        Ok(ServiceConfig {
            root: self.project_root()?.to_path_buf(),
            indexer: IndexerConfig {
                walk: (&self.walk).into(),
                chunker: (&self.chunker).into(),
                embed_concurrency: self.embedding.concurrency,
            },
        })
    }
}
