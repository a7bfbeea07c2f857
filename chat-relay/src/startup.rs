//! Application startup and lifecycle management.
//!
//! Wires the chat model into the router, binds the listener and serves until a
//! shutdown signal arrives.

use crate::config::{ProviderKind, RelayConfig};
use crate::handlers::{chat, health_check, metrics::metrics, readiness_check};
use crate::services::metrics::init_metrics;
use crate::services::providers::gemini::{GeminiChatModel, GeminiConfig};
use crate::services::providers::mock::MockChatModel;
use crate::services::providers::{ChatModel, GenerationParams};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, RequestIdMakeSpan};
use service_core::retry::RetryPolicy;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Timeout for a single call to the Gemini API.
const GEMINI_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat_model: Arc<dyn ChatModel>,
    pub retry_policy: RetryPolicy,
    pub prompt_prefix: Arc<str>,
}

impl AppState {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        retry_policy: RetryPolicy,
        prompt_prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            chat_model,
            retry_policy,
            prompt_prefix: prompt_prefix.into(),
        }
    }

    pub fn from_config(config: &RelayConfig, chat_model: Arc<dyn ChatModel>) -> Self {
        Self::new(
            chat_model,
            RetryPolicy::new(config.retry.max_attempts, config.retry.initial_delay()),
            config.chat.prompt_prefix.as_str(),
        )
    }
}

/// Build the chat model selected by configuration.
pub fn build_chat_model(config: &RelayConfig) -> Result<Arc<dyn ChatModel>, AppError> {
    match config.provider {
        ProviderKind::Gemini => {
            let gemini_config = GeminiConfig {
                api_key: config.google.api_key.clone(),
                model: config.model.name.clone(),
                api_base: config.google.api_base.clone(),
                timeout: GEMINI_REQUEST_TIMEOUT,
            };
            let model = GeminiChatModel::new(gemini_config, &GenerationParams::from(&config.model))
                .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

            tracing::info!(model = %model.model(), "Initialized Gemini chat model");
            Ok(Arc::new(model))
        }
        ProviderKind::Mock => {
            tracing::info!("GENAI_PROVIDER=mock, using mock chat model");
            Ok(Arc::new(MockChatModel::new()))
        }
    }
}

/// Build the HTTP router.
///
/// Paths without a route are served from `static_dir`.
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the chat model selected by configuration.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let chat_model = build_chat_model(&config)?;
        Self::build_with_model(config, chat_model).await
    }

    /// Build the application around an already constructed chat model.
    pub async fn build_with_model(
        config: RelayConfig,
        chat_model: Arc<dyn ChatModel>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let state = AppState::from_config(&config, chat_model);
        tracing::info!(
            max_attempts = state.retry_policy.attempts(),
            initial_delay_ms = config.retry.initial_delay_ms,
            static_dir = %config.chat.static_dir,
            "Chat relay configured"
        );
        let router = build_router(state, &config.chat.static_dir);

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal is received.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!("Server running at http://0.0.0.0:{}", self.port);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
