//! The orchestration loop, the heart of forgeloop.
//!
//! One user prompt starts a turn:
//!
//! 1. **Generate** with the full history and every registered tool
//! 2. **Append** the assistant message
//! 3. **If tool calls**: check for a repeated round, run the calls in order,
//!    append one tool message with their results, loop back to step 1
//! 4. **If text only**: the turn is complete
//!
//! The turn also stops when the model repeats the exact same tool round
//! twice in a row, or when the tool-round ceiling is reached.

pub mod loop_runner;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS};
pub use state::{OrchestrationState, SIGNATURE_WINDOW, StepOutcome, TerminalState};
