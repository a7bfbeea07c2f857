//! Prometheus metrics for chat-relay.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{Once, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static CHAT_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CHAT_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static CHAT_SEND_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENAI_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

static INIT: Once = Once::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        let registry = Registry::new();

        let chat_requests = IntCounterVec::new(
            Opts::new("chat_requests_total", "Total chat requests by outcome"),
            &["outcome"],
        )
        .expect("Failed to create chat_requests_total metric");

        // Includes time spent in backoff between attempts
        let chat_duration = HistogramVec::new(
            HistogramOpts::new(
                "chat_request_duration_seconds",
                "Chat request duration in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["outcome"],
        )
        .expect("Failed to create chat_request_duration_seconds metric");

        let send_attempts = IntCounterVec::new(
            Opts::new(
                "chat_send_attempts_total",
                "Individual send attempts against the chat provider",
            ),
            &["provider", "result"],
        )
        .expect("Failed to create chat_send_attempts_total metric");

        let tokens = IntCounterVec::new(
            Opts::new("genai_tokens_total", "Total tokens processed"),
            &["model", "type"], // type: input, output
        )
        .expect("Failed to create genai_tokens_total metric");

        registry
            .register(Box::new(chat_requests.clone()))
            .expect("Failed to register chat_requests_total");
        registry
            .register(Box::new(chat_duration.clone()))
            .expect("Failed to register chat_request_duration_seconds");
        registry
            .register(Box::new(send_attempts.clone()))
            .expect("Failed to register chat_send_attempts_total");
        registry
            .register(Box::new(tokens.clone()))
            .expect("Failed to register genai_tokens_total");

        let _ = REGISTRY.set(registry);
        let _ = CHAT_REQUESTS_TOTAL.set(chat_requests);
        let _ = CHAT_REQUEST_DURATION_SECONDS.set(chat_duration);
        let _ = CHAT_SEND_ATTEMPTS_TOTAL.set(send_attempts);
        let _ = GENAI_TOKENS_TOTAL.set(tokens);

        tracing::info!("Prometheus metrics initialized");
    });
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record a finished `/chat` request.
pub fn record_chat_request(outcome: &str, duration_secs: f64) {
    if let Some(counter) = CHAT_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
    if let Some(histogram) = CHAT_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }
}

/// Record one send attempt. `result` is `success` or a provider error kind.
pub fn record_send_attempt(provider: &str, result: &str) {
    if let Some(counter) = CHAT_SEND_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[provider, result]).inc();
    }
}

/// Record token usage reported by the model.
pub fn record_tokens(model: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(counter) = GENAI_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}
