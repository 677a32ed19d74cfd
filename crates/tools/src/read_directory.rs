//! Directory listing tool.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::Tool;
use serde_json::{Map, Value};

use crate::workspace::Workspace;

pub struct ReadDirectoryTool {
    workspace: Workspace,
}

impl ReadDirectoryTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadDirectoryTool {
    fn name(&self) -> &str {
        "read_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory in the workspace. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "dir": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace (\".\" for the root)"
                }
            },
            "required": ["dir"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let dir = arguments
            .get("dir")
            .and_then(Value::as_str)
            .unwrap_or(".");
        let resolved = self.workspace.resolve(self.name(), dir)?;

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "read_directory".into(),
            reason: format!("Failed to list '{dir}': {e}"),
        };

        let mut reader = tokio::fs::read_dir(&resolved).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(failed)? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        let shown = self.workspace.display(&resolved);
        if entries.is_empty() {
            return Ok(format!("{shown}: (empty directory)"));
        }
        Ok(format!("{shown}:\n{}", entries.join("\n")))
    }
}
