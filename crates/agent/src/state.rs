//! Per-turn orchestration state and terminal outcomes.
//!
//! `OrchestrationState` is a plain value: each step takes it and hands back
//! the next one, so the loop-detection rule can be exercised on its own.

use std::collections::VecDeque;

use forgeloop_core::error::Error;

/// How many recent turn signatures are remembered.
pub const SIGNATURE_WINDOW: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationState {
    iteration: u32,
    recent_signatures: VecDeque<String>,
}

impl OrchestrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed tool rounds in this turn.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Oldest first, at most [`SIGNATURE_WINDOW`] entries.
    pub fn recent_signatures(&self) -> &VecDeque<String> {
        &self.recent_signatures
    }

    /// Remember a turn signature, evicting the oldest beyond the window.
    pub fn record_signature(mut self, signature: impl Into<String>) -> Self {
        if self.recent_signatures.len() == SIGNATURE_WINDOW {
            self.recent_signatures.pop_front();
        }
        self.recent_signatures.push_back(signature.into());
        self
    }

    /// The two most recent signatures are identical.
    pub fn is_looping(&self) -> bool {
        let mut latest = self.recent_signatures.iter().rev();
        match (latest.next(), latest.next()) {
            (Some(last), Some(previous)) => last == previous,
            _ => false,
        }
    }

    /// Count one finished tool round.
    pub fn advance(mut self) -> Self {
        self.iteration += 1;
        self
    }
}

/// How a turn ended.
#[derive(Debug)]
pub enum TerminalState {
    /// The model answered without requesting tools
    Completed,
    /// The model repeated the exact same tool round twice in a row
    AbortedLoop,
    /// The tool-round ceiling was reached
    AbortedMaxIterations,
    /// A fatal or exhausted provider error, or a tool configuration error
    Failed(Error),
}

impl TerminalState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AbortedLoop => "aborted_loop",
            Self::AbortedMaxIterations => "aborted_max_iterations",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::AbortedLoop => {
                f.write_str("stopped: the model repeated the same tool calls without progress")
            }
            Self::AbortedMaxIterations => f.write_str("stopped: too many tool rounds in one turn"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Result of one orchestration step.
#[derive(Debug)]
pub enum StepOutcome {
    Continue(OrchestrationState),
    Finished(TerminalState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_not_looping() {
        let state = OrchestrationState::new();
        assert_eq!(state.iteration(), 0);
        assert!(!state.is_looping());
        assert!(!state.record_signature("a()").is_looping());
    }

    #[test]
    fn second_identical_signature_is_a_loop() {
        let state = OrchestrationState::new().record_signature(r#"read_file({"path":"a"})"#);
        assert!(!state.is_looping());
        let state = state.record_signature(r#"read_file({"path":"a"})"#);
        assert!(state.is_looping());
    }

    #[test]
    fn only_the_two_most_recent_matter() {
        let state = OrchestrationState::new()
            .record_signature("a()")
            .record_signature("b()")
            .record_signature("a()");
        assert!(!state.is_looping());
    }

    #[test]
    fn window_evicts_oldest() {
        let state = OrchestrationState::new()
            .record_signature("1")
            .record_signature("2")
            .record_signature("3")
            .record_signature("4");
        assert_eq!(state.recent_signatures().len(), SIGNATURE_WINDOW);
        assert_eq!(
            state.recent_signatures().iter().collect::<Vec<_>>(),
            vec!["2", "3", "4"]
        );
    }

    #[test]
    fn advance_counts_rounds() {
        let state = OrchestrationState::new().advance().advance();
        assert_eq!(state.iteration(), 2);
    }

    #[test]
    fn terminal_labels() {
        assert_eq!(TerminalState::Completed.label(), "completed");
        assert_eq!(TerminalState::AbortedLoop.label(), "aborted_loop");
        let failed = TerminalState::Failed(Error::Internal("boom".into()));
        assert_eq!(failed.label(), "failed");
        assert!(failed.to_string().contains("boom"));
        assert!(!failed.is_completed());
    }
}
