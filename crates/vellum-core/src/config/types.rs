use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vellum_index::chunker::ChunkerConfig;
use vellum_index::walker::WalkOptions;
use vellum_llm::ollama::{DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL};

/// Directory under the project root that holds the default database.
pub const STATE_DIR: &str = ".vellum";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(default)]
    pub walk: WalkConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Required; validation fails without it.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.into()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Chunks of one file embedded at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            timeout_seconds: default_timeout_seconds(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_chat_model() -> String {
    "llama3.2".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Database file, or `:memory:`. Defaults to `<root>/.vellum/embeddings.db`.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_target_size() -> usize {
    500
}

fn default_max_size() -> usize {
    2000
}

fn default_window_lines() -> usize {
    50
}

fn default_min_chars() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkerSection {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_window_lines")]
    pub window_lines: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            max_size: default_max_size(),
            window_lines: default_window_lines(),
            min_chars: default_min_chars(),
        }
    }
}

impl From<&ChunkerSection> for ChunkerConfig {
    fn from(section: &ChunkerSection) -> Self {
        Self {
            target_size: section.target_size,
            max_size: section.max_size,
            window_lines: section.window_lines,
            min_chars: section.min_chars,
        }
    }
}

/// Walker rules; every list replaces its default when present.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalkConfig {
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub include_extensions: Vec<String>,
    pub allow_hidden: Vec<String>,
    pub max_file_size: u64,
    pub respect_gitignore: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        let options = WalkOptions::default();
        Self {
            exclude_dirs: options.exclude_dirs,
            exclude_files: options.exclude_files,
            include_extensions: options.include_extensions,
            allow_hidden: options.allow_hidden,
            max_file_size: options.max_file_size,
            respect_gitignore: options.respect_gitignore,
        }
    }
}

impl From<&WalkConfig> for WalkOptions {
    fn from(walk: &WalkConfig) -> Self {
        Self {
            exclude_dirs: walk.exclude_dirs.clone(),
            exclude_files: walk.exclude_files.clone(),
            include_extensions: walk.include_extensions.clone(),
            allow_hidden: walk.allow_hidden.clone(),
            max_file_size: walk.max_file_size,
            respect_gitignore: walk.respect_gitignore,
        }
    }
}

fn default_search_limit() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    /// Hits scoring below this are left out of `ask` prompts.
    #[serde(default)]
    pub score_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            score_threshold: 0.0,
        }
    }
}
