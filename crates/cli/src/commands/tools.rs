//! `forgeloop tools`: list the tools the model can call.

use std::sync::Arc;

use forgeloop_config::AppConfig;
use forgeloop_core::tool::ToolSet;
use forgeloop_tools::{ToolRouter, file_tool_set};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let root = config.tools.workspace_root_or_cwd();

    let mut router = ToolRouter::new();
    router.register(Arc::new(file_tool_set(&root)))?;

    println!("Workspace: {}", root.display());
    println!();
    for set in router.sets() {
        println!("[{}]", set.name());
        for tool in set.list_tools() {
            println!("  {:<16} {}", tool.name, tool.description);
        }
    }

    Ok(())
}
