use std::time::Duration;

use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::http::client_with_timeout;
use crate::provider::{ChatProvider, ChatStream, EmbeddingProvider, Message, Role};
use crate::vector::l2_normalize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

/// Client for `POST {base_url}/api/embeddings`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client: client_with_timeout(DEFAULT_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = client_with_timeout(timeout);
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the model server answers at all.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Unreachable` if nothing listens at the base URL, or
    /// `LlmError::Api` for a non-2xx answer.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn transport_error(&self, err: reqwest::Error) -> LlmError {
        LlmError::from_transport(err, &self.base_url, self.timeout.as_secs())
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::error!("embedding API error {status}: {text}");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let vector = parsed
            .embedding
            .ok_or_else(|| LlmError::MalformedResponse("missing `embedding` field".into()))?;
        if vector.is_empty() {
            return Err(LlmError::MalformedResponse("empty embedding vector".into()));
        }

        Ok(l2_normalize(vector))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

/// Streaming chat client, sibling of the embedder.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: Ollama,
    model: String,
}

impl OllamaChat {
    #[must_use]
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        let (host, port) = parse_host_port(base_url);
        let client = match reqwest::Url::parse(&host) {
            Ok(host) if !host.cannot_be_a_base() => {
                Ollama::builder().host(host).port(port).build()
            }
            Ok(_) => {
                tracing::warn!("unusable ollama url {base_url}, falling back to default");
                Ollama::default()
            }
            Err(e) => {
                tracing::warn!("invalid ollama url {base_url}: {e}, falling back to default");
                Ollama::default()
            }
        };
        Self {
            client,
            model: model.into(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatProvider for OllamaChat {
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let stream = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| LlmError::Stream(format!("Ollama streaming request failed: {e}")))?;

        let mapped = stream.map(|item| match item {
            Ok(response) => Ok(response.message.content),
            Err(()) => Err(LlmError::Stream("Ollama stream chunk failed".into())),
        });

        Ok(Box::pin(mapped))
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::User => ChatMessage::user(text),
        Role::Assistant => ChatMessage::assistant(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}
