//! Progress events: the observable side channel of a turn.
//!
//! Iteration counts, tool-call echoes, and retry notices are published here.
//! They are not part of any return contract; nothing breaks when nobody
//! is subscribed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything a turn reports while it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A user prompt started a new turn
    TurnStarted {
        conversation_id: String,
        prompt_preview: String,
    },

    /// A generation call is about to be made (1-based)
    IterationStarted { iteration: u32 },

    /// A tool is about to run
    ToolCallStarted {
        name: String,
        parameters: serde_json::Value,
    },

    /// A tool finished (successfully or with an error string)
    ToolCallFinished {
        name: String,
        success: bool,
        duration_ms: u64,
    },

    /// A provider call failed transiently and will be retried
    RetryScheduled {
        provider: String,
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The turn reached a terminal state
    TurnFinished {
        conversation_id: String,
        outcome: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TurnStarted { prompt_preview, .. } => write!(f, "turn started: {prompt_preview}"),
            Self::IterationStarted { iteration } => write!(f, "iteration {iteration}"),
            Self::ToolCallStarted { name, parameters } => write!(f, "→ {name}({parameters})"),
            Self::ToolCallFinished {
                name,
                success,
                duration_ms,
            } => {
                let status = if *success { "ok" } else { "error" };
                write!(f, "← {name} [{status}] {duration_ms}ms")
            }
            Self::RetryScheduled {
                provider,
                attempt,
                max_retries,
                delay_ms,
                reason,
                ..
            } => write!(
                f,
                "{provider}: {reason}; retry {attempt}/{max_retries} in {:.1}s",
                *delay_ms as f64 / 1000.0
            ),
            Self::TurnFinished {
                outcome,
                iterations,
                ..
            } => write!(f, "turn finished: {outcome} after {iterations} tool rounds"),
        }
    }
}

/// A broadcast-based event bus for progress events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
