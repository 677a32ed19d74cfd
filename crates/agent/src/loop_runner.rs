//! The orchestration loop implementation.

use std::sync::Arc;

use forgeloop_core::error::Error;
use forgeloop_core::event::{EventBus, ProgressEvent};
use forgeloop_core::message::{Conversation, Message, Role, turn_signature};
use forgeloop_core::provider::Provider;
use forgeloop_tools::ToolRouter;
use tracing::{debug, info, warn};

use crate::state::{OrchestrationState, StepOutcome, TerminalState};

/// Default ceiling on tool rounds per user turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// Drives one user turn: generate, dispatch tools, repeat.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Where tool calls are dispatched
    router: Arc<ToolRouter>,

    /// Progress events
    event_bus: Arc<EventBus>,

    /// Maximum tool rounds per turn
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, router: Arc<ToolRouter>, event_bus: Arc<EventBus>) -> Self {
        Self {
            provider,
            router,
            event_bus,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of tool rounds per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// One iteration: generate, then either finish or run the requested tools.
    ///
    /// The assistant message is always appended before any stop condition is
    /// checked, and a tool message is appended for every round that runs.
    pub async fn step(
        &self,
        state: OrchestrationState,
        conversation: &mut Conversation,
    ) -> Result<StepOutcome, Error> {
        self.event_bus.publish(ProgressEvent::IterationStarted {
            iteration: state.iteration() + 1,
        });
        debug!(
            conversation_id = %conversation.id,
            iteration = state.iteration() + 1,
            "Orchestration iteration"
        );

        let tools = self.router.definitions()?;
        let response = self.provider.generate(&conversation.messages, &tools).await?;

        let calls = response.tool_calls.clone();
        conversation.push(response.into_message());

        if calls.is_empty() {
            return Ok(StepOutcome::Finished(TerminalState::Completed));
        }

        let state = state.record_signature(turn_signature(&calls));
        if state.is_looping() {
            warn!(
                conversation_id = %conversation.id,
                iteration = state.iteration() + 1,
                "Model repeated identical tool calls, aborting turn"
            );
            return Ok(StepOutcome::Finished(TerminalState::AbortedLoop));
        }

        debug!(tool_count = calls.len(), "Executing tool calls");
        let outcomes = self.router.dispatch_all(&calls).await;
        let results = outcomes.into_iter().map(|o| o.output).collect();
        conversation.push(Message::tool_results(results));

        let state = state.advance();
        if state.iteration() >= self.max_iterations {
            warn!(
                conversation_id = %conversation.id,
                iterations = state.iteration(),
                "Max tool iterations reached, aborting turn"
            );
            return Ok(StepOutcome::Finished(TerminalState::AbortedMaxIterations));
        }

        Ok(StepOutcome::Continue(state))
    }

    /// Append the user prompt and loop until a terminal state.
    ///
    /// Errors never escape: they end the turn as [`TerminalState::Failed`]
    /// with history kept as it was when the failure happened.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        prompt: impl Into<String>,
    ) -> TerminalState {
        let prompt = prompt.into();
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Starting turn"
        );
        self.event_bus.publish(ProgressEvent::TurnStarted {
            conversation_id: conversation.id.to_string(),
            prompt_preview: preview(&prompt),
        });

        let turn_start = conversation.len();
        conversation.push(Message::user(prompt));

        let mut state = OrchestrationState::new();
        let terminal = loop {
            match self.step(state, conversation).await {
                Ok(StepOutcome::Continue(next)) => state = next,
                Ok(StepOutcome::Finished(terminal)) => break terminal,
                Err(e) => {
                    warn!(conversation_id = %conversation.id, error = %e, "Turn failed");
                    break TerminalState::Failed(e);
                }
            }
        };

        let rounds = conversation.messages[turn_start..]
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count() as u32;

        info!(
            conversation_id = %conversation.id,
            outcome = terminal.label(),
            tool_rounds = rounds,
            "Turn finished"
        );
        self.event_bus.publish(ProgressEvent::TurnFinished {
            conversation_id: conversation.id.to_string(),
            outcome: terminal.label().to_string(),
            iterations: rounds,
            timestamp: chrono::Utc::now(),
        });

        terminal
    }
}

fn preview(prompt: &str) -> String {
    const LIMIT: usize = 80;
    match prompt.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &prompt[..idx]),
        None => prompt.to_string(),
    }
}
