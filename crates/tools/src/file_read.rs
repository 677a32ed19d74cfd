//! File read tool: read file contents inside the workspace.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::Tool;
use serde_json::{Map, Value};

use crate::workspace::Workspace;

/// Files larger than this are truncated in the result.
const MAX_READ_BYTES: usize = 256 * 1024;

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. The path is relative to the workspace root."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let path = arguments
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.workspace.resolve(self.name(), path)?;

        let mut content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("Failed to read '{path}': {e}"),
            })?;

        if content.len() > MAX_READ_BYTES {
            let mut cut = MAX_READ_BYTES;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            let total = content.len();
            content.truncate(cut);
            content.push_str(&format!("\n[truncated: showing {cut} of {total} bytes]"));
        }

        Ok(content)
    }
}
