//! Gemini chat provider implementation.
//!
//! Talks to the `generateContent` method of Google's Generative Language REST
//! API. The full session history is sent with every message.

use super::{ChatModel, ChatRole, ChatSession, ChatTurn, GenerationParams, ProviderError};
use crate::services::metrics;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    /// Base URL up to and including the API version, without trailing slash.
    pub api_base: String,
    pub timeout: Duration,
}

/// Gemini chat model. Holds the shared HTTP client.
pub struct GeminiChatModel {
    config: Arc<GeminiConfig>,
    client: Client,
    generation_config: GenerationConfig,
}

impl GeminiChatModel {
    pub fn new(config: GeminiConfig, params: &GenerationParams) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config: Arc::new(config),
            client,
            generation_config: GenerationConfig::from(params),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn start_chat(&self, history: Vec<ChatTurn>) -> Box<dyn ChatSession> {
        Box::new(GeminiChatSession {
            config: self.config.clone(),
            client: self.client.clone(),
            generation_config: self.generation_config.clone(),
            history: Mutex::new(history),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.expose_secret().is_empty() {
            Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// A single Gemini conversation.
pub struct GeminiChatSession {
    config: Arc<GeminiConfig>,
    client: Client,
    generation_config: GenerationConfig,
    history: Mutex<Vec<ChatTurn>>,
}

impl GeminiChatSession {
    /// Build the API URL for the given method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            method,
            self.config.api_key.expose_secret()
        )
    }
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send_message(&self, message: &str) -> Result<String, ProviderError> {
        let mut contents: Vec<Content> = self
            .history
            .lock()
            .await
            .iter()
            .map(Content::from)
            .collect();
        contents.push(Content::from(&ChatTurn::user(message)));

        let request = GenerateContentRequest {
            contents,
            generation_config: Some(self.generation_config.clone()),
        };

        tracing::debug!(
            model = %self.config.model,
            message_len = message.len(),
            history_len = request.contents.len() - 1,
            "Sending request to Gemini API"
        );

        // The URL carries the API key, so it is stripped from transport errors.
        let response = self
            .client
            .post(self.api_url("generateContent"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            tracing::warn!(
                model = %self.config.model,
                block_reason = reason,
                "Prompt blocked by Gemini"
            );
            return Err(ProviderError::ContentFiltered);
        }

        let candidate = api_response
            .candidates
            .first()
            .ok_or(ProviderError::EmptyResponse)?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(ProviderError::ContentFiltered);
        }

        let text: String = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        if let Some(usage) = api_response.usage_metadata {
            let input_tokens = usage.prompt_token_count.unwrap_or(0);
            let output_tokens = usage.candidates_token_count.unwrap_or(0);
            tracing::debug!(
                model = %self.config.model,
                input_tokens,
                output_tokens,
                finish_reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN"),
                "Gemini response received"
            );
            metrics::record_tokens(&self.config.model, input_tokens, output_tokens);
        }

        let mut history = self.history.lock().await;
        history.push(ChatTurn::user(message));
        history.push(ChatTurn::model(text.clone()));

        Ok(text)
    }

    async fn history(&self) -> Vec<ChatTurn> {
        self.history.lock().await.clone()
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl From<&ChatTurn> for Content {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: Some(turn.role.as_str().to_string()),
            parts: vec![Part {
                text: Some(turn.text.clone()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

impl From<&GenerationParams> for GenerationConfig {
    fn from(params: &GenerationParams) -> Self {
        Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
            response_mime_type: params.response_mime_type.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
