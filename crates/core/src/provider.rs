//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider takes canonical history plus the available tool definitions
//! and returns one canonical assistant turn. Wire formats never leak past
//! this boundary.
//!
//! Implementations: flat (OpenAI-style) and block (Anthropic-style) adapters,
//! plus decorators such as the retrying wrapper.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// Which vendor wire protocol an adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Flat protocol: one `tool` message per call, `call_<i>` ids
    OpenAi,
    /// Block protocol: `tool_use` / `tool_result` content blocks
    #[default]
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" | "openai-style" => Ok(Self::OpenAi),
            "anthropic" | "anthropic-style" => Ok(Self::Anthropic),
            other => Err(format!("unknown provider kind '{other}'")),
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name, unique across all registered tool sets
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One generated assistant turn in canonical form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Text content (may be empty when only tools are called)
    pub content: String,

    /// Requested tool calls, empty when the model answered directly
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerateResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            ..Self::default()
        }
    }

    /// The assistant message to append to history.
    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.content, self.tool_calls)
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// History is borrowed read-only; the orchestrator owns it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Generate the next assistant turn.
    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> std::result::Result<GenerateResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parsing() {
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!(
            "Anthropic".parse::<ProviderKind>(),
            Ok(ProviderKind::Anthropic)
        );
        assert!("gemini".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, r#""openai""#);
        let kind: ProviderKind = serde_json::from_str(r#""anthropic""#).unwrap();
        assert_eq!(kind, ProviderKind::Anthropic);
    }

    #[test]
    fn response_without_calls_deserializes_to_empty_vec() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "read_directory".into(),
            description: "List a directory".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "dir": { "type": "string", "description": "Directory to list" }
                },
                "required": ["dir"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("read_directory"));
        assert!(json.contains("dir"));
    }
}
