//! Tool abstractions: what the orchestrator can reach.
//!
//! The orchestrator only knows [`ToolSet`]: a named group of tools that can
//! list its definitions and execute one of them by name. [`Tool`] and
//! [`ToolRegistry`] are a convenient way to build a tool set out of
//! individual tools; external collaborators may implement `ToolSet` directly.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A group of related tools under one dispatchable namespace.
#[async_trait]
pub trait ToolSet: Send + Sync {
    /// Name of the set, used in logs and duplicate-name errors.
    fn name(&self) -> &str;

    /// Tools currently offered by this set.
    fn list_tools(&self) -> Vec<ToolDefinition>;

    /// Execute one of this set's tools and return its textual result.
    async fn execute_tool(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> std::result::Result<String, ToolError>;
}

/// A single tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: &Map<String, Value>) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An ordered collection of tools exposed as one tool set.
pub struct ToolRegistry {
    name: String,
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolSet for ToolRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    async fn execute_tool(
        &self,
        name: &str,
        parameters: &Map<String, Value>,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(parameters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
            arguments
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "named"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new("test").with(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_keeps_registration_order() {
        let registry = ToolRegistry::new("test")
            .with(Box::new(NamedTool("zeta")))
            .with(Box::new(NamedTool("alpha")))
            .with(Box::new(NamedTool("mid")));
        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        let defs = registry.list_tools();
        assert_eq!(defs[0].name, "zeta");
        assert_eq!(defs[2].name, "mid");
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let mut registry = ToolRegistry::new("test")
            .with(Box::new(NamedTool("a")))
            .with(Box::new(NamedTool("b")));
        registry.register(Box::new(NamedTool("a")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn registry_executes_as_tool_set() {
        let registry = ToolRegistry::new("test").with(Box::new(EchoTool));
        let out = registry
            .execute_tool("echo", &args(serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new("test");
        let err = registry
            .execute_tool("nonexistent", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
