use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::startup::AppState;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "chat-relay",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe: the chat provider must be configured.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    match state.chat_model.health_check().await {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) => {
            tracing::warn!(
                provider = state.chat_model.provider_name(),
                error = %e,
                "Chat provider not ready"
            );
            Err(AppError::ServiceUnavailable)
        }
    }
}
