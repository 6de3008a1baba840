//! External model capability
//!
//! The delegated path talks to a black-box language-model service through
//! the [`ModelProvider`] trait: one composed instruction, a bounded
//! conversation history, a clamped randomness parameter, and either text or
//! a [`ModelError`] back. Error display strings are short and
//! locale-agnostic because the controller surfaces them verbatim in the
//! conversation thread.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod openai;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors from the external model capability
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No API credential configured; fatal for the delegated path only
    #[error("missing API credential")]
    MissingCredential,

    /// Non-success HTTP status from the service
    #[error("model service error {status}: {message}")]
    Http {
        /// HTTP-like status code
        status: u16,
        /// Short upstream message
        message: String,
    },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("malformed model reply: {0}")]
    Parse(String),

    /// Service answered with no usable text
    #[error("empty model reply")]
    EmptyReply,

    /// Call exceeded the request timeout
    #[error("model call timed out")]
    Timeout,
}

/// Role of a conversation participant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human participant
    User,
    /// Engine or model responses
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One history entry on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who said it
    pub role: MessageRole,
    /// What was said
    pub content: String,
}

impl HistoryEntry {
    /// Convenience constructor.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A complete request to the external model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Composed system instruction
    pub instruction: String,
    /// Recent conversation history, already capped by the caller
    pub history: Vec<HistoryEntry>,
    /// Randomness budget in [0,1]; clamped again at the wire
    pub temperature: f64,
}

/// The model's reply
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    /// Reply text
    pub text: String,
}

/// Contract every model backend implements
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Backend name for logs and diagnostics
    fn name(&self) -> &str;

    /// Execute one completion request
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply>;

    /// Whether the backend is currently usable (credential present etc.)
    async fn check_health(&self) -> bool {
        true
    }
}
