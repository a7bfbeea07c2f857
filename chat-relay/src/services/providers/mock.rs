//! Mock chat provider for tests and offline runs.

use super::{ChatModel, ChatSession, ChatTurn, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted outcome for one send.
pub type MockOutcome = Result<String, ProviderError>;

#[derive(Default)]
struct MockState {
    script: Mutex<VecDeque<MockOutcome>>,
    received: Mutex<Vec<String>>,
    calls: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock chat model.
///
/// Outcomes are consumed in order across every session it starts. When the
/// script runs out the model echoes the message, or fails if built with
/// [`MockChatModel::always_failing`].
#[derive(Clone, Default)]
pub struct MockChatModel {
    state: Arc<MockState>,
    always_fail: bool,
}

impl MockChatModel {
    /// Echoes every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plays `outcomes` first, then falls back to echoing.
    pub fn with_script(outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        let model = Self::default();
        lock(&model.state.script).extend(outcomes);
        model
    }

    /// Fails every send with an API error.
    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Number of send calls across all sessions.
    pub fn calls(&self) -> u32 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Every message received, in order.
    pub fn received(&self) -> Vec<String> {
        lock(&self.state.received).clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn start_chat(&self, history: Vec<ChatTurn>) -> Box<dyn ChatSession> {
        Box::new(MockChatSession {
            model: self.clone(),
            history: tokio::sync::Mutex::new(history),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Session handed out by [`MockChatModel`].
pub struct MockChatSession {
    model: MockChatModel,
    history: tokio::sync::Mutex<Vec<ChatTurn>>,
}

#[async_trait]
impl ChatSession for MockChatSession {
    async fn send_message(&self, message: &str) -> Result<String, ProviderError> {
        let state = &self.model.state;
        state.calls.fetch_add(1, Ordering::SeqCst);
        lock(&state.received).push(message.to_string());

        let scripted = lock(&state.script).pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None if self.model.always_fail => Err(ProviderError::ApiError(
                "Mock provider configured to fail".to_string(),
            )),
            None => Ok(format!("Mock response for: {}", message)),
        };

        let text = outcome?;
        let mut history = self.history.lock().await;
        history.push(ChatTurn::user(message));
        history.push(ChatTurn::model(text.clone()));
        Ok(text)
    }

    async fn history(&self) -> Vec<ChatTurn> {
        self.history.lock().await.clone()
    }
}
