use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::services::{metrics, send_message_with_retry, SendFailure};
use crate::startup::AppState;

/// Body returned to the caller on any failure. Carries no internal detail.
pub const CHAT_ERROR_MESSAGE: &str = "Error generating response. Please try again later.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// A missing field is treated as an empty message.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Failure of `/chat`. Renders as a plain-text 500 with no internal detail.
#[derive(Debug)]
pub struct ChatError(pub SendFailure);

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, CHAT_ERROR_MESSAGE).into_response()
    }
}

/// Prefix the user's message with the conciseness instruction.
pub fn build_prompt(prefix: &str, message: &str) -> String {
    format!("{}{}", prefix, message)
}

/// `POST /chat`: relay one message through a fresh chat session.
#[tracing::instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let started = Instant::now();
    tracing::debug!(message_len = request.message.len(), "Chat request received");
    let prompt = build_prompt(&state.prompt_prefix, &request.message);

    // Every request starts with an empty history.
    let session = state.chat_model.start_chat(Vec::new());

    match send_message_with_retry(
        session.as_ref(),
        state.chat_model.provider_name(),
        &prompt,
        &state.retry_policy,
    )
    .await
    {
        Ok(response) => {
            metrics::record_chat_request("success", started.elapsed().as_secs_f64());
            tracing::info!(response_len = response.len(), "Chat response generated");
            Ok(Json(ChatResponse { response }))
        }
        Err(failure) => {
            metrics::record_chat_request("failure", started.elapsed().as_secs_f64());
            tracing::error!(
                attempts = failure.attempts,
                error = %failure.source,
                "Error generating response"
            );
            Err(ChatError(failure))
        }
    }
}
