//! HTTP handlers for the chat relay.

pub mod chat;
pub mod health;
pub mod metrics;

pub use chat::{chat, CHAT_ERROR_MESSAGE};
pub use health::{health_check, readiness_check};
