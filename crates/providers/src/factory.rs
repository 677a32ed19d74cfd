//! Provider factory: selects the vendor adapter from configuration.
//!
//! Every adapter comes back wrapped in a [`RetryingProvider`], so callers
//! only ever see fatal or exhausted failures.

use std::sync::Arc;

use forgeloop_config::AppConfig;
use forgeloop_core::error::Error;
use forgeloop_core::event::EventBus;
use forgeloop_core::provider::{Provider, ProviderKind};
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiProvider;
use crate::retry::{RetryPolicy, RetryingProvider};

/// Build the adapter for `config.provider.kind`, wrapped with retries.
pub fn build_provider(
    config: &AppConfig,
    events: Option<Arc<EventBus>>,
) -> Result<Arc<dyn Provider>, Error> {
    let provider_config = &config.provider;
    let api_key = provider_config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::Config {
            message: format!(
                "no API key for provider '{}'. Set FORGELOOP_API_KEY or provider.api_key",
                provider_config.kind
            ),
        })?;

    let model = provider_config.model_or_default();
    let base_url = provider_config.api_url_or_default();

    let adapter: Arc<dyn Provider> = match provider_config.kind {
        ProviderKind::OpenAi => Arc::new(
            OpenAiProvider::new(api_key, model)
                .with_base_url(base_url)
                .with_system_prompt(config.system_prompt.as_str())
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature),
        ),
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::new(api_key, model)
                .with_base_url(base_url)
                .with_system_prompt(config.system_prompt.as_str())
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature),
        ),
    };

    info!(provider = %provider_config.kind, model, "Provider configured");

    let mut retrying = RetryingProvider::new(adapter, RetryPolicy::from(&config.retry));
    if let Some(events) = events {
        retrying = retrying.with_events(events);
    }
    Ok(Arc::new(retrying))
}
