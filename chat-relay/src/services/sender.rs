//! Retrying message sender.
//!
//! Wraps a single [`ChatSession::send_message`] call in the shared
//! exponential-backoff loop from `service_core::retry`.

use super::metrics;
use super::providers::{ChatSession, ProviderError};
use service_core::retry::{retry_with_backoff, RetryPolicy};
use thiserror::Error;

/// Every attempt failed. Carries the error from the final attempt.
#[derive(Debug, Error)]
#[error("No response after {attempts} attempt(s): {source}")]
pub struct SendFailure {
    pub attempts: u32,
    #[source]
    pub source: ProviderError,
}

/// Send `message` on `session`, retrying per `policy`.
///
/// Returns the first successful reply. After the last failed attempt the
/// underlying error is returned inside [`SendFailure`] without a further delay.
#[tracing::instrument(skip_all, fields(
    provider = provider,
    message_len = message.len(),
    max_attempts = policy.attempts(),
))]
pub async fn send_message_with_retry(
    session: &dyn ChatSession,
    provider: &'static str,
    message: &str,
    policy: &RetryPolicy,
) -> Result<String, SendFailure> {
    retry_with_backoff(policy, "send_message", || async move {
        let result = session.send_message(message).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_send_attempt(provider, outcome);
        result
    })
    .await
    .map_err(|e| SendFailure {
        attempts: e.attempts,
        source: e.last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockChatModel;
    use crate::services::providers::ChatModel;
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_attempts: u32, initial_delay_ms: u64) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(initial_delay_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_returns_immediately() {
        let model = MockChatModel::new();
        let session = model.start_chat(Vec::new());
        let start = Instant::now();

        let reply = send_message_with_retry(session.as_ref(), "mock", "hello", &policy(3, 1000))
            .await
            .unwrap();

        assert_eq!(reply, "Mock response for: hello");
        assert_eq!(model.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_session_is_tried_max_attempts_times() {
        for max_attempts in 1..=4 {
            let model = MockChatModel::always_failing();
            let session = model.start_chat(Vec::new());

            let err = send_message_with_retry(
                session.as_ref(),
                "mock",
                "hello",
                &policy(max_attempts, 10),
            )
            .await
            .unwrap_err();

            assert_eq!(model.calls(), max_attempts);
            assert_eq!(err.attempts, max_attempts);
            assert!(matches!(err.source, ProviderError::ApiError(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_waits_three_seconds() {
        let model = MockChatModel::with_script([
            Err(ProviderError::NetworkError("reset".to_string())),
            Err(ProviderError::RateLimited),
            Ok("third time lucky".to_string()),
        ]);
        let session = model.start_chat(Vec::new());
        let start = Instant::now();

        let reply = send_message_with_retry(session.as_ref(), "mock", "hello", &policy(3, 1000))
            .await
            .unwrap();

        assert_eq!(reply, "third time lucky");
        assert_eq!(model.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert!(start.elapsed() < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn last_error_is_the_one_surfaced() {
        let model = MockChatModel::with_script([
            Err(ProviderError::NetworkError("first".to_string())),
            Err(ProviderError::RateLimited),
        ]);
        let session = model.start_chat(Vec::new());

        let err = send_message_with_retry(session.as_ref(), "mock", "hello", &policy(2, 1000))
            .await
            .unwrap_err();

        assert_eq!(err.source, ProviderError::RateLimited);
        assert_eq!(err.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_message_is_resent_on_retry() {
        let model = MockChatModel::with_script([Err(ProviderError::RateLimited)]);
        let session = model.start_chat(Vec::new());

        send_message_with_retry(session.as_ref(), "mock", "ping", &policy(3, 5))
            .await
            .unwrap();

        assert_eq!(model.received(), vec!["ping".to_string(), "ping".to_string()]);
        assert_eq!(session.history().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_counted_by_error_kind() {
        metrics::init_metrics();
        let model = MockChatModel::with_script([
            Err(ProviderError::ContentFiltered),
            Ok("fine".to_string()),
        ]);
        let session = model.start_chat(Vec::new());

        send_message_with_retry(session.as_ref(), "kind-test", "hello", &policy(2, 10))
            .await
            .unwrap();

        let text = metrics::get_metrics();
        assert!(text.contains(
            "chat_send_attempts_total{provider=\"kind-test\",result=\"content_filtered\"} 1"
        ));
        assert!(text.contains(
            "chat_send_attempts_total{provider=\"kind-test\",result=\"success\"} 1"
        ));
    }
}
