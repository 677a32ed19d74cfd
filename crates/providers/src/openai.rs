//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing `/chat/completions` with
//! function calling.
//!
//! The flat protocol pairs every tool call with its own `role: "tool"`
//! message. Canonical history has one tool message per round, so each one
//! is expanded here into one wire message per result, ids `call_<i>`.

use async_trait::async_trait;
use forgeloop_core::error::ProviderError;
use forgeloop_core::message::{Message, Role, ToolCall};
use forgeloop_core::provider::{GenerateResponse, Provider, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: None,
            max_tokens: None,
            temperature: 0.7,
            client: http::client(Duration::from_secs(120)),
        }
    }

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
        self.max_tokens = Some(max_tokens);
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
            "messages": self.to_api_messages(history),
            "temperature": self.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(tools));
        }

        body
    }

    /// Convert canonical history to OpenAI API format, system message first.
    fn to_api_messages(&self, history: &[Message]) -> Vec<ApiMessage> {
        let mut result = Vec::with_capacity(history.len() + 1);
        if let Some(ref sys) = self.system_prompt {
            result.push(ApiMessage::text("system", sys));
        }

        let mut i = 0;
        while i < history.len() {
            let msg = &history[i];
            match msg.role {
                Role::User => result.push(ApiMessage::text("user", &msg.content)),
                Role::Assistant if msg.tool_calls.is_empty() => {
                    result.push(ApiMessage::text("assistant", &msg.content));
                }
                Role::Assistant => {
                    let results = history.get(i + 1).filter(|next| next.role == Role::Tool);
                    let Some(results) = results else {
                        result.push(ApiMessage::text(
                            "assistant",
                            &http::unanswered_calls_as_text(msg),
                        ));
                        i += 1;
                        continue;
                    };

                    let tool_calls = msg
                        .tool_calls
                        .iter()
                        .enumerate()
                        .map(|(idx, tc)| ApiToolCall {
                            id: call_id(idx),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: serde_json::Value::Object(tc.parameters.clone())
                                    .to_string(),
                            },
                        })
                        .collect();
                    result.push(ApiMessage {
                        role: "assistant".into(),
                        content: (!msg.content.is_empty()).then(|| msg.content.clone()),
                        tool_calls: Some(tool_calls),
                        tool_call_id: None,
                    });

                    for (idx, content) in results
                        .result_parts(msg.tool_calls.len())
                        .into_iter()
                        .enumerate()
                    {
                        result.push(ApiMessage {
                            role: "tool".into(),
                            content: Some(content),
                            tool_calls: None,
                            tool_call_id: Some(call_id(idx)),
                        });
                    }

                    i += 2;
                    continue;
                }
                // Results with no calls to attach to
                Role::Tool => result.push(ApiMessage::text(
                    "user",
                    &format!("Tool results:\n{}", msg.content),
                )),
            }
            i += 1;
        }

        result
    }
}

fn call_id(index: usize) -> String {
    format!("call_{index}")
}

/// Convert tool definitions to OpenAI API format.
fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

/// Decode the `arguments` string of a function call.
fn parse_arguments(name: &str, arguments: &str) -> ToolCall {
    if arguments.trim().is_empty() {
        return ToolCall::from_value(name, serde_json::Value::Null);
    }
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(value) => ToolCall::from_value(name, value),
        Err(e) => {
            warn!(tool = name, error = %e, "Unparseable tool arguments, using empty parameters");
            ToolCall::from_value(name, serde_json::Value::Null)
        }
    }
}

fn parse_response(api_response: ApiResponse) -> Result<GenerateResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| parse_arguments(&tc.function.name, &tc.function.arguments))
        .collect();

    Ok(GenerateResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        model: api_response.model,
        usage: api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> std::result::Result<GenerateResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(history, tools);

        debug!(provider = "openai", model = %self.model, messages = history.len(), "Sending generation request");

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let api_response: ApiResponse = http::send_json(request, "openai").await?;
        parse_response(api_response)
    }
}

// --- API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "default_function_type")]
    r#type: String,
    function: ApiFunction,
}

fn default_function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
