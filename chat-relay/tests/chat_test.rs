//! Router-level tests for `/chat` and the surrounding routes.
//!
//! Requests go through `tower::ServiceExt::oneshot`; no socket is bound.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chat_relay::handlers::CHAT_ERROR_MESSAGE;
use chat_relay::services::providers::mock::MockChatModel;
use chat_relay::services::providers::ProviderError;
use chat_relay::startup::{build_router, AppState};
use service_core::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::util::ServiceExt;

const PREFIX: &str = "Please respond concisely: ";

fn app(model: &MockChatModel, policy: RetryPolicy, static_dir: &std::path::Path) -> Router {
    let state = AppState::new(Arc::new(model.clone()), policy, PREFIX);
    build_router(state, static_dir)
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn chat_returns_model_response() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::new();

    let response = app(&model, RetryPolicy::default(), dir.path())
        .oneshot(chat_request(r#"{"message": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let text = body["response"].as_str().unwrap();
    assert!(!text.is_empty());
    assert_eq!(text, "Mock response for: Please respond concisely: hello");
}

#[tokio::test]
async fn chat_sends_prefixed_prompt_once() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::new();

    app(&model, RetryPolicy::default(), dir.path())
        .oneshot(chat_request(r#"{"message": "what is rust?"}"#))
        .await
        .unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(
        model.received(),
        vec!["Please respond concisely: what is rust?".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn chat_recovers_after_transient_failures() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::with_script([
        Err(ProviderError::RateLimited),
        Err(ProviderError::NetworkError("connection reset".to_string())),
        Ok("recovered".to_string()),
    ]);
    let start = Instant::now();

    let response = app(&model, RetryPolicy::new(3, Duration::from_millis(1000)), dir.path())
        .oneshot(chat_request(r#"{"message": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(3000));
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["response"], "recovered");
    assert_eq!(model.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn chat_returns_plain_500_when_all_attempts_fail() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::always_failing();

    let response = app(&model, RetryPolicy::new(3, Duration::from_millis(1000)), dir.path())
        .oneshot(chat_request(r#"{"message": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(body_string(response).await, CHAT_ERROR_MESSAGE);
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn chat_error_does_not_leak_provider_detail() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::with_script([Err(ProviderError::ApiError(
        "Gemini API error 403: API key invalid".to_string(),
    ))]);

    let response = app(&model, RetryPolicy::no_retry(), dir.path())
        .oneshot(chat_request(r#"{"message": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(!body.contains("403"));
    assert!(!body.contains("API key"));
}

#[tokio::test]
async fn chat_without_message_field_sends_prefix_only() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::new();

    let response = app(&model, RetryPolicy::default(), dir.path())
        .oneshot(chat_request("{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(model.received(), vec![PREFIX.to_string()]);
}

#[tokio::test]
async fn chat_rejects_non_json_body() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::new();

    let response = app(&model, RetryPolicy::default(), dir.path())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn unknown_paths_are_served_from_static_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>chat</h1>").unwrap();
    let model = MockChatModel::new();
    let router = app(&model, RetryPolicy::default(), dir.path());

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<h1>chat</h1>");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/missing.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_ready_report_ok() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::new();
    let router = app(&model, RetryPolicy::default(), dir.path());

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "chat-relay");

    let response = router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let dir = tempfile::tempdir().unwrap();
    let model = MockChatModel::new();

    let response = app(&model, RetryPolicy::default(), dir.path())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-42");
}
