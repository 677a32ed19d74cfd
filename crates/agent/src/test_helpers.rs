//! Shared test helpers for orchestration tests.

use async_trait::async_trait;
use forgeloop_core::error::{ProviderError, ToolError};
use forgeloop_core::message::{Message, ToolCall};
use forgeloop_core::provider::{GenerateResponse, Provider, ToolDefinition, Usage};
use forgeloop_core::tool::ToolSet;
use serde_json::{Map, Value};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `generate` returns the next result in the queue and records
/// the history length it was given. Panics if more calls are made than
/// results provided.
pub struct SequentialMockProvider {
    results: Mutex<Vec<Result<GenerateResponse, ProviderError>>>,
    history_lengths: Mutex<Vec<usize>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<GenerateResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<GenerateResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            history_lengths: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.history_lengths.lock().unwrap().len()
    }

    /// History length seen by each call, in call order.
    pub fn history_lengths(&self) -> Vec<usize> {
        self.history_lengths.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn generate(
        &self,
        history: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<GenerateResponse, ProviderError> {
        let mut lengths = self.history_lengths.lock().unwrap();
        let results = self.results.lock().unwrap();
        let index = lengths.len();

        if index >= results.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                results.len()
            );
        }

        lengths.push(history.len());
        results[index].clone()
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        content: text.into(),
        tool_calls: Vec::new(),
        model: "mock-model".into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// Create a response that requests tool calls.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> GenerateResponse {
    GenerateResponse {
        tool_calls,
        ..make_text_response(thought)
    }
}

pub fn call(name: &str, parameters: Value) -> ToolCall {
    ToolCall::from_value(name, parameters)
}

/// A tool set whose tools answer `<tool>: <text>`.
pub struct EchoToolSet {
    tools: Vec<String>,
}

impl EchoToolSet {
    pub fn new(tools: &[&str]) -> Self {
        Self {
            tools: tools.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ToolSet for EchoToolSet {
    fn name(&self) -> &str {
        "echo"
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: "Echoes its text".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}}
                }),
            })
            .collect()
    }

    async fn execute_tool(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let text = parameters
            .get("text")
            .or_else(|| parameters.get("path"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(format!("{name}: {text}"))
    }
}
