use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Stream of assistant text fragments, in arrival order.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Turns text into a fixed-length, unit-normalized vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`.
    ///
    /// Implementations normalize the vector before returning it, so callers can
    /// score with a plain dot product.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable, answers with a non-2xx
    /// status, or the response carries no usable vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;
}

/// Streaming chat completions, used by the assistant-facing `ask` flow only.
pub trait ChatProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the streaming request cannot be started.
    fn chat_stream(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;
}
