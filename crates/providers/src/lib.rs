//! LLM provider adapters for forgeloop.
//!
//! Both adapters implement `forgeloop_core::Provider`. The factory selects
//! one from configuration and wraps it in the retrying decorator.

pub mod anthropic;
pub mod factory;
mod http;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use factory::build_provider;
pub use openai::OpenAiProvider;
pub use retry::{Attempt, RetryDecision, RetryNotice, RetryPolicy, RetryingProvider, retry_with_backoff};
