use std::path::PathBuf;
use std::str::FromStr;

use super::Config;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    if let Ok(parsed) = value.parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {value}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VELLUM_PROJECT_ROOT") {
            self.project.root = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("VELLUM_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("VELLUM_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(secs) = parsed::<u64>("VELLUM_EMBEDDING_TIMEOUT") {
            self.embedding.timeout_seconds = secs;
        }
        if let Some(n) = parsed::<usize>("VELLUM_EMBEDDING_CONCURRENCY") {
            self.embedding.concurrency = n;
        }
        if let Ok(v) = std::env::var("VELLUM_CHAT_MODEL") {
            self.chat.model = v;
        }
        if let Ok(v) = std::env::var("VELLUM_STORE_PATH") {
            self.store.path = Some(v);
        }
        if let Some(size) = parsed::<usize>("VELLUM_CHUNK_TARGET_SIZE") {
            self.chunker.target_size = size;
        }
        if let Some(bytes) = parsed::<u64>("VELLUM_WALK_MAX_FILE_SIZE") {
            self.walk.max_file_size = bytes;
        }
        if let Some(limit) = parsed::<usize>("VELLUM_SEARCH_LIMIT") {
            self.search.default_limit = limit;
        }
    }
}
