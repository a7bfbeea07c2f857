pub mod metrics;
pub mod providers;
pub mod sender;

pub use providers::{ChatModel, ChatSession, ProviderError};
pub use sender::{send_message_with_retry, SendFailure};
