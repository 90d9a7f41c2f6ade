#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("embedding service unreachable at {base_url} (is the model server running?)")]
    Unreachable {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {base_url} timed out after {seconds}s")]
    Timeout { base_url: String, seconds: u64 },

    #[error("embedding API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chat stream failed: {0}")]
    Stream(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Classify a transport-level `reqwest` failure against the endpoint it targeted.
    #[must_use]
    pub fn from_transport(err: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if err.is_connect() {
            Self::Unreachable {
                base_url: base_url.to_owned(),
                source: err,
            }
        } else if err.is_timeout() {
            Self::Timeout {
                base_url: base_url.to_owned(),
                seconds: timeout_secs,
            }
        } else {
            Self::Http(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
