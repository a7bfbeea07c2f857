use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_env_parsed, is_production};
use service_core::error::AppError;
use std::time::Duration;

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Instruction prepended to every user message.
pub const DEFAULT_PROMPT_PREFIX: &str = "Please respond concisely: ";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub provider: ProviderKind,
    pub google: GoogleConfig,
    pub model: ModelConfig,
    pub retry: RetryConfig,
    pub chat: ChatConfig,
    pub observability: ObservabilityConfig,
}

/// Which chat backend the relay talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "GENAI_PROVIDER must be 'gemini' or 'mock', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model name, e.g. gemini-1.5-pro-002
    pub name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    /// Kept low so answers stay short
    pub max_output_tokens: i32,
    pub response_mime_type: String,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub prompt_prefix: String,
    /// Directory served for every path without a route.
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

/// `public` when run from the crate directory, `chat-relay/public` from the
/// workspace root.
fn default_static_dir() -> String {
    let in_crate_dir = std::env::current_dir()
        .map(|dir| dir.ends_with("chat-relay"))
        .unwrap_or(false);

    if in_crate_dir {
        "public".to_string()
    } else {
        "chat-relay/public".to_string()
    }
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        let provider: ProviderKind = get_env("GENAI_PROVIDER", Some("gemini"), is_prod)?.parse()?;

        // The mock backend never calls Google, so the key may be absent.
        let api_key_default = match provider {
            ProviderKind::Mock => Some(""),
            ProviderKind::Gemini => None,
        };

        Ok(RelayConfig {
            common: common_config,
            provider,
            google: GoogleConfig {
                api_key: Secret::new(get_env("GEMINI_API_KEY", api_key_default, is_prod)?),
                api_base: get_env("GENAI_API_BASE", Some(DEFAULT_GEMINI_API_BASE), is_prod)?,
            },
            model: ModelConfig {
                name: get_env("GENAI_MODEL", Some("gemini-1.5-pro-002"), is_prod)?,
                temperature: get_env_parsed("GENAI_TEMPERATURE", 0.7, is_prod)?,
                top_p: get_env_parsed("GENAI_TOP_P", 0.9, is_prod)?,
                top_k: get_env_parsed("GENAI_TOP_K", 40, is_prod)?,
                max_output_tokens: get_env_parsed("GENAI_MAX_OUTPUT_TOKENS", 100, is_prod)?,
                response_mime_type: get_env(
                    "GENAI_RESPONSE_MIME_TYPE",
                    Some("text/plain"),
                    is_prod,
                )?,
            },
            retry: RetryConfig {
                max_attempts: get_env_parsed("CHAT_RETRY_MAX_ATTEMPTS", 3, is_prod)?,
                initial_delay_ms: get_env_parsed("CHAT_RETRY_INITIAL_DELAY_MS", 1000, is_prod)?,
            },
            chat: ChatConfig {
                prompt_prefix: get_env("CHAT_PROMPT_PREFIX", Some(DEFAULT_PROMPT_PREFIX), is_prod)?,
                static_dir: get_env("STATIC_DIR", Some(&default_static_dir()), is_prod)?,
            },
            observability: ObservabilityConfig {
                log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
                otlp_endpoint: std::env::var("OTLP_ENDPOINT")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
        })
    }
}
