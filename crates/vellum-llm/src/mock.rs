//! Test-only deterministic embedding provider.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::provider::{ChatProvider, ChatStream, EmbeddingProvider, Message};
use crate::vector::l2_normalize;

/// Hashed bag-of-words embedder: texts sharing words get similar vectors.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    /// Any text containing this marker fails with an API error.
    pub fail_marker: Option<String>,
    /// Every call fails as if the server were down.
    pub unavailable: bool,
    pub chat_response: String,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimensions: 256,
            fail_marker: None,
            unavailable: false,
            chat_response: "mock response".into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self {
            fail_marker: Some(marker.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Number of `embed` calls so far, shared across clones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions.max(1)];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % v.len() as u64) as usize;
            v[bucket] += 1.0;
        }
        l2_normalize(v)
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(LlmError::Other("mock embedding service down".into()));
        }
        if let Some(marker) = &self.fail_marker
            && text.contains(marker.as_str())
        {
            return Err(LlmError::Api {
                status: 500,
                body: "mock failure".into(),
            });
        }
        Ok(self.vector_for(text))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

impl ChatProvider for MockEmbedder {
    async fn chat_stream(&self, _messages: &[Message]) -> Result<ChatStream, LlmError> {
        let chunks: Vec<_> = self
            .chat_response
            .split_inclusive(' ')
            .map(|s| Ok(s.to_owned()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}
