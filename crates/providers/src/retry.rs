//! Retry with exponential backoff for transient provider failures.
//!
//! The policy is a pure function over a classified attempt; the driver
//! loop owns the sleeping and the jitter sampling.

use async_trait::async_trait;
use forgeloop_config::RetryConfig;
use forgeloop_core::error::{ErrorClass, ProviderError};
use forgeloop_core::event::{EventBus, ProgressEvent};
use forgeloop_core::message::Message;
use forgeloop_core::provider::{GenerateResponse, Provider, ToolDefinition};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How many times, and how patiently, to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }
}

/// The classified outcome of one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Ok(T),
    Retryable(ProviderError),
    Fatal(ProviderError),
}

impl<T> Attempt<T> {
    pub fn classify(result: Result<T, ProviderError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => match e.classify() {
                ErrorClass::Retryable => Self::Retryable(e),
                ErrorClass::Fatal => Self::Fatal(e),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Done,
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// `base * 2^attempt + jitter`, with `attempt` counted from 0.
    pub fn delay_for(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).saturating_add(jitter)
    }

    /// What to do after attempt number `attempt` (0-based) produced `outcome`.
    pub fn decide<T>(&self, attempt: u32, outcome: &Attempt<T>, jitter: Duration) -> RetryDecision {
        match outcome {
            Attempt::Ok(_) => RetryDecision::Done,
            Attempt::Fatal(_) => RetryDecision::GiveUp,
            Attempt::Retryable(_) if attempt < self.max_retries => {
                RetryDecision::RetryAfter(self.delay_for(attempt, jitter))
            }
            Attempt::Retryable(_) => RetryDecision::GiveUp,
        }
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(0..=max_ms))
    }
}

/// Emitted right before a retry sleep.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    /// 1-based number of the retry about to happen
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub reason: String,
}

/// Run `op` until it succeeds, fails fatally, or runs out of retries.
///
/// Fatal errors come back untouched and without any sleep. Exhaustion is
/// reported as [`ProviderError::RetriesExhausted`] wrapping the last error.
pub async fn retry_with_backoff<T, F, Fut, N>(
    policy: &RetryPolicy,
    label: &str,
    mut on_retry: N,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
    N: FnMut(&RetryNotice),
{
    let mut attempt = 0u32;
    loop {
        let outcome = Attempt::classify(op().await);
        let decision = policy.decide(attempt, &outcome, policy.sample_jitter());

        match (decision, outcome) {
            (_, Attempt::Ok(value)) => return Ok(value),
            (_, Attempt::Fatal(e)) => return Err(e),
            (RetryDecision::RetryAfter(delay), Attempt::Retryable(e)) => {
                let notice = RetryNotice {
                    attempt: attempt + 1,
                    max_retries: policy.max_retries,
                    delay,
                    reason: e.to_string(),
                };
                warn!(
                    provider = label,
                    attempt = notice.attempt,
                    max_retries = notice.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                on_retry(&notice);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            (_, Attempt::Retryable(e)) => {
                return Err(ProviderError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(e),
                });
            }
        }
    }
}

/// A provider decorator that retries transient failures of the inner one.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    policy: RetryPolicy,
    events: Option<Arc<EventBus>>,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            events: None,
        }
    }

    /// Publish a `RetryScheduled` event before every retry sleep.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let provider = self.inner.name().to_string();
        let events = self.events.clone();

        retry_with_backoff(
            &self.policy,
            &provider,
            |notice| {
                if let Some(bus) = &events {
                    bus.publish(ProgressEvent::RetryScheduled {
                        provider: provider.clone(),
                        attempt: notice.attempt,
                        max_retries: notice.max_retries,
                        delay_ms: notice.delay.as_millis() as u64,
                        reason: notice.reason.clone(),
                        timestamp: chrono::Utc::now(),
                    });
                }
            },
            || self.inner.generate(history, tools),
        )
        .await
    }
}
