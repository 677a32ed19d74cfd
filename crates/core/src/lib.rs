//! # forgeloop core
//!
//! The vendor-neutral vocabulary of the tool-calling orchestrator: messages,
//! tool calls, tool definitions, the error taxonomy, and the two seams the
//! orchestrator talks through (`Provider` and `ToolSet`).
//!
//! ## Design Philosophy
//!
//! Every collaborator is a trait here. Implementations live in their
//! respective crates:
//! - `forgeloop-providers` translates canonical history to vendor wire formats
//! - `forgeloop-tools` routes tool calls to tool sets
//! - `forgeloop-agent` drives the turn loop

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorClass, ProviderError, Result, ToolError};
pub use event::{EventBus, ProgressEvent};
pub use message::{Conversation, ConversationId, Message, Role, ToolCall, turn_signature};
pub use provider::{GenerateResponse, Provider, ProviderKind, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry, ToolSet};
