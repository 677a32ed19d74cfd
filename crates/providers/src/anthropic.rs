//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//!
//! Canonical history keeps one tool message per round of calls. On the wire
//! that message becomes one user message holding a `tool_result` block for
//! every `tool_use` id, matched by position.

use async_trait::async_trait;
use forgeloop_core::error::ProviderError;
use forgeloop_core::message::{Message, Role, ToolCall};
use forgeloop_core::provider::{GenerateResponse, Provider, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.7,
            // Anthropic can be slow on long tool-heavy turns
            client: http::client(Duration::from_secs(300)),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The full request body for one generation call.
    pub fn build_request_body(&self, history: &[Message], tools: &[ToolDefinition]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": to_api_messages(history),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        if let Some(ref sys) = self.system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(tools));
        }

        body
    }
}

/// Id of the `index`-th tool call of an assistant message.
fn tool_use_id(msg: &Message, index: usize) -> String {
    format!("call_{}_{}", msg.timestamp.timestamp_millis(), index)
}

/// Convert canonical history to Anthropic API format with content blocks.
fn to_api_messages(history: &[Message]) -> Vec<AnthropicMessage> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < history.len() {
        let msg = &history[i];
        match msg.role {
            Role::User => result.push(AnthropicMessage::text("user", &msg.content)),
            Role::Assistant if msg.tool_calls.is_empty() => {
                result.push(AnthropicMessage::text("assistant", &msg.content));
            }
            Role::Assistant => {
                let results = history.get(i + 1).filter(|next| next.role == Role::Tool);
                let Some(results) = results else {
                    result.push(AnthropicMessage::text(
                        "assistant",
                        &http::unanswered_calls_as_text(msg),
                    ));
                    i += 1;
                    continue;
                };

                let mut blocks: Vec<ContentBlock> = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: msg.content.clone(),
                    });
                }
                for (idx, tc) in msg.tool_calls.iter().enumerate() {
                    blocks.push(ContentBlock::ToolUse {
                        id: tool_use_id(msg, idx),
                        name: tc.name.clone(),
                        input: serde_json::Value::Object(tc.parameters.clone()),
                    });
                }
                result.push(AnthropicMessage {
                    role: "assistant".into(),
                    content: AnthropicContent::Blocks(blocks),
                });

                let result_blocks = results
                    .result_parts(msg.tool_calls.len())
                    .into_iter()
                    .enumerate()
                    .map(|(idx, content)| ContentBlock::ToolResult {
                        tool_use_id: tool_use_id(msg, idx),
                        content,
                    })
                    .collect();
                result.push(AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Blocks(result_blocks),
                });

                i += 2;
                continue;
            }
            // Results with no calls to attach to
            Role::Tool => result.push(AnthropicMessage::text(
                "user",
                &format!("Tool results:\n{}", msg.content),
            )),
        }
        i += 1;
    }

    result
}

/// Convert tool definitions to Anthropic format.
fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|t| AnthropicTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters.clone(),
        })
        .collect()
}

fn parse_response(resp: AnthropicResponse) -> GenerateResponse {
    let mut text_content = String::new();
    let mut tool_calls = Vec::new();

    for block in resp.content {
        match block {
            ResponseContentBlock::Text { text } => {
                if !text_content.is_empty() {
                    text_content.push('\n');
                }
                text_content.push_str(&text);
            }
            ResponseContentBlock::ToolUse { name, input, .. } => {
                tool_calls.push(ToolCall::from_value(name, input));
            }
            ResponseContentBlock::Other => {}
        }
    }

    GenerateResponse {
        content: text_content,
        tool_calls,
        model: resp.model,
        usage: resp.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }),
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(history, tools);

        debug!(provider = "anthropic", model = %self.model, messages = history.len(), "Sending generation request");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body);

        let api_resp: AnthropicResponse = http::send_json(request, "anthropic").await?;
        Ok(parse_response(api_resp))
    }
}

// --- Wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

impl AnthropicMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: AnthropicContent::Text(text.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Thinking and other block kinds carry nothing canonical
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-ant-test", "claude-test").with_system_prompt("Be terse.")
    }

    fn two_call_turn() -> Message {
        Message::assistant_with_calls(
            "Checking both.",
            vec![
                ToolCall::from_value("read_file", json!({"path": "a.txt"})),
                ToolCall::from_value("read_file", json!({"path": "b.txt"})),
            ],
        )
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = provider().with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn system_prompt_is_top_level_and_not_in_messages() {
        let body = provider().build_request_body(&[Message::user("Hello")], &[]);
        assert_eq!(body["system"], "Be terse.");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let provider = AnthropicProvider::new("k", "m").with_system_prompt("  ");
        let body = provider.build_request_body(&[Message::user("Hello")], &[]);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn tool_definitions_map_one_to_one() {
        let tools = vec![ToolDefinition {
            name: "read_directory".into(),
            description: "List a directory".into(),
            parameters: json!({"type": "object", "properties": {"dir": {"type": "string"}}}),
        }];
        let body = provider().build_request_body(&[Message::user("hi")], &tools);
        assert_eq!(body["tools"][0]["name"], "read_directory");
        assert_eq!(body["tools"][0]["input_schema"]["properties"]["dir"]["type"], "string");
    }

    #[test]
    fn two_calls_round_trip_into_matched_blocks() {
        let assistant = two_call_turn();
        let history = vec![
            Message::user("Compare a and b"),
            assistant.clone(),
            Message::tool_results(vec!["alpha".into(), "beta".into()]),
        ];
        let body = provider().build_request_body(&history, &[]);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);

        let uses = messages[1]["content"].as_array().unwrap();
        assert_eq!(uses[0]["type"], "text");
        assert_eq!(uses[1]["type"], "tool_use");
        assert_eq!(uses[2]["type"], "tool_use");
        let first_id = uses[1]["id"].as_str().unwrap();
        let second_id = uses[2]["id"].as_str().unwrap();
        let millis = assistant.timestamp.timestamp_millis();
        assert_eq!(first_id, format!("call_{millis}_0"));
        assert_eq!(second_id, format!("call_{millis}_1"));
        assert_eq!(uses[2]["input"]["path"], "b.txt");

        assert_eq!(messages[2]["role"], "user");
        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["type"], "tool_result");
        assert_eq!(results[0]["tool_use_id"], first_id);
        assert_eq!(results[0]["content"], "alpha");
        assert_eq!(results[1]["tool_use_id"], second_id);
        assert_eq!(results[1]["content"], "beta");
    }

    #[test]
    fn combined_text_is_split_back_into_blocks() {
        let history = vec![
            Message::user("Compare a and b"),
            two_call_turn(),
            Message::tool_output("alpha\n\nTool 2 result: beta"),
        ];
        let body = provider().build_request_body(&history, &[]);
        let results = body["messages"][2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["content"], "alpha");
        assert_eq!(results[1]["content"], "beta");
    }

    // The text-only path misattributes a result that itself contains the
    // marker. Structured results are not affected.
    #[test]
    fn marker_inside_result_only_breaks_the_text_path() {
        let tricky = "line one\n\nTool output follows".to_string();

        let combined = forgeloop_core::message::combine_results(&[tricky.clone(), "beta".into()]);
        let history = vec![Message::user("go"), two_call_turn(), Message::tool_output(combined)];
        let body = provider().build_request_body(&history, &[]);
        let results = body["messages"][2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["content"], "line one");
        assert_ne!(results[1]["content"], "beta");

        let history = vec![
            Message::user("go"),
            two_call_turn(),
            Message::tool_results(vec![tricky.clone(), "beta".into()]),
        ];
        let body = provider().build_request_body(&history, &[]);
        let results = body["messages"][2]["content"].as_array().unwrap();
        assert_eq!(results[0]["content"], tricky.as_str());
        assert_eq!(results[1]["content"], "beta");
    }

    #[test]
    fn unanswered_calls_are_sent_as_text() {
        let history = vec![Message::user("go"), two_call_turn(), Message::user("never mind")];
        let body = provider().build_request_body(&history, &[]);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        let text = messages[1]["content"].as_str().unwrap();
        assert!(text.contains("tool calls not executed"));
        assert!(!body.to_string().contains("tool_use"));
    }

    #[test]
    fn parse_text_and_tool_use() {
        let resp: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-test",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "read_directory", "input": {"dir": "."}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let response = parse_response(resp);
        assert_eq!(response.content, "Let me look.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "read_directory");
        assert_eq!(response.tool_calls[0].parameters["dir"], ".");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn text_only_response_has_empty_tool_calls() {
        let resp: AnthropicResponse = serde_json::from_value(json!({
            "model": "claude-test",
            "content": [{"type": "text", "text": "one"}, {"type": "text", "text": "two"}]
        }))
        .unwrap();
        let response = parse_response(resp);
        assert_eq!(response.content, "one\ntwo");
        assert!(response.tool_calls.is_empty());
    }
}
