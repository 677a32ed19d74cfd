//! Workspace confinement for the file tools.
//!
//! Paths from the model are relative to one root directory. Absolute paths
//! and `..` components are refused outright; anything that resolves through
//! a symlink to outside the root is refused after canonicalization. Paths
//! that do not exist yet are checked through their nearest existing ancestor.

use forgeloop_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied relative path inside the workspace.
    pub fn resolve(&self, tool_name: &str, requested: &str) -> Result<PathBuf, ToolError> {
        let denied = |reason: String| ToolError::PermissionDenied {
            tool_name: tool_name.into(),
            reason,
        };

        let requested = requested.trim();
        let relative = Path::new(requested);
        if relative.has_root() {
            return Err(denied(format!(
                "'{requested}' is absolute; use a path relative to the workspace"
            )));
        }

        for component in relative.components() {
            match component {
                Component::ParentDir => {
                    return Err(denied(format!("path traversal detected in '{requested}'")));
                }
                Component::Prefix(_) | Component::RootDir => {
                    return Err(denied(format!("'{requested}' is absolute")));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }

        let joined = self.root.join(relative);

        // A path that does not exist yet is checked through its nearest
        // existing ancestor. A dangling symlink counts as an escape.
        for ancestor in joined.ancestors() {
            if std::fs::symlink_metadata(ancestor).is_err() {
                continue;
            }
            let inside = ancestor
                .canonicalize()
                .map(|canonical| canonical.starts_with(&self.root))
                .unwrap_or(false);
            if !inside {
                return Err(denied(format!("'{requested}' resolves outside the workspace")));
            }
            break;
        }

        Ok(joined)
    }

    /// Path relative to the root, for display.
    pub fn display(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            ".".into()
        } else {
            parts.join("/")
        }
    }
}
