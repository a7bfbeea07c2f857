//! Chat model abstractions and implementations.
//!
//! A [`ChatModel`] is constructed once at startup and shared by every request.
//! Each request starts its own [`ChatSession`], which owns the conversation
//! history for that exchange.

pub mod gemini;
pub mod mock;

use crate::config::ModelConfig;
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Empty response")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label for the `result` of `chat_send_attempts_total`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::EmptyResponse => "empty_response",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// Author of a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One message in a chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Generation parameters applied to every message of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Top-p sampling.
    pub top_p: Option<f32>,

    /// Top-k sampling.
    pub top_k: Option<i32>,

    /// Maximum output tokens.
    pub max_output_tokens: Option<i32>,

    /// MIME type of the generated content.
    pub response_mime_type: Option<String>,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(model: &ModelConfig) -> Self {
        Self {
            temperature: Some(model.temperature),
            top_p: Some(model.top_p),
            top_k: Some(model.top_k),
            max_output_tokens: Some(model.max_output_tokens),
            response_mime_type: Some(model.response_mime_type.clone()),
        }
    }
}

/// An ongoing exchange with a chat model.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Send a user message and return the model's reply text.
    ///
    /// A failed call leaves the history untouched, so the same message can be
    /// sent again.
    async fn send_message(&self, message: &str) -> Result<String, ProviderError>;

    /// Snapshot of the turns exchanged so far.
    async fn history(&self) -> Vec<ChatTurn>;
}

/// Factory for chat sessions (e.g., Gemini).
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name used in logs and metrics.
    fn provider_name(&self) -> &'static str;

    /// Start a new session seeded with `history`.
    fn start_chat(&self, history: Vec<ChatTurn>) -> Box<dyn ChatSession>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
