//! Tool routing and the built-in file tool set for forgeloop.
//!
//! The router is what the orchestration loop talks to. The file tools are
//! one ordinary tool set behind it: listing, reading and writing files
//! confined to a workspace root.

pub mod file_read;
pub mod file_write;
pub mod read_directory;
pub mod router;
pub mod workspace;

use std::path::PathBuf;

use forgeloop_core::tool::ToolRegistry;

pub use router::{ToolOutcome, ToolRouter, combine_results};
pub use workspace::Workspace;

/// Name under which the file tools are registered.
pub const FILE_TOOL_SET: &str = "files";

/// The built-in file tool set, confined to `root`.
pub fn file_tool_set(root: impl Into<PathBuf>) -> ToolRegistry {
    let workspace = Workspace::new(root);
    ToolRegistry::new(FILE_TOOL_SET)
        .with(Box::new(read_directory::ReadDirectoryTool::new(workspace.clone())))
        .with(Box::new(file_read::ReadFileTool::new(workspace.clone())))
        .with(Box::new(file_write::WriteFileTool::new(workspace)))
}
