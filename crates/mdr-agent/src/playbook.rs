//! Markdown investigation playbooks.
//!
//! A playbook directory holds `.md` files, optionally grouped into
//! category subdirectories:
//!
//! ```text
//! playbooks/
//!   investigation/detailed_host_investigation.md
//!   response/host_isolation.md
//! ```

use mdr_actions::{
    ParameterDef, ParameterType, ToolArguments, ToolArgumentsExt, ToolError, ToolOutput,
    ToolRegistry,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const PLAYBOOK_EXTENSION: &str = "md";

/// Playbook errors.
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("Playbook not found: {name} (available: {available:?})")]
    NotFound { name: String, available: Vec<String> },

    #[error("Failed to read playbook {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Summary of one playbook file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybookInfo {
    /// File stem.
    pub name: String,
    /// Parent directory relative to the playbook root, empty at the top level.
    pub category: String,
    /// Text of the first line when it is a `#` heading.
    pub description: String,
    /// Path relative to the playbook root.
    pub path: String,
}

/// Loads playbooks from a directory tree.
#[derive(Debug, Clone)]
pub struct PlaybookLoader {
    root: PathBuf,
}

impl PlaybookLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Playbooks shipped with this crate.
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/playbooks"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists every playbook under the root, sorted by relative path.
    ///
    /// A missing root yields an empty list. Unreadable entries are skipped.
    pub fn list(&self) -> Vec<PlaybookInfo> {
        let mut files = Vec::new();
        collect_markdown(&self.root, &mut files);
        files.sort();

        files
            .into_iter()
            .filter_map(|path| self.describe(&path))
            .collect()
    }

    /// Returns a playbook's full content by name.
    ///
    /// When several files share a name, the first in path order wins.
    pub fn get(&self, name: &str) -> Result<String, PlaybookError> {
        let playbooks = self.list();
        let Some(info) = playbooks.iter().find(|p| p.name == name) else {
            return Err(PlaybookError::NotFound {
                name: name.to_string(),
                available: playbooks.into_iter().map(|p| p.name).collect(),
            });
        };

        let path = self.root.join(&info.path);
        fs::read_to_string(&path).map_err(|source| PlaybookError::Io { path, source })
    }

    fn describe(&self, path: &Path) -> Option<PlaybookInfo> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let name = path.file_stem()?.to_string_lossy().into_owned();
        let category = relative
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let description = match fs::read_to_string(path) {
            Ok(content) => heading_of(&content),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable playbook");
                return None;
            }
        };

        Some(PlaybookInfo {
            name,
            category,
            description,
            path: relative.to_string_lossy().into_owned(),
        })
    }
}

fn heading_of(content: &str) -> String {
    content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .unwrap_or_else(|| "No description".to_string())
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Playbook directory not readable");
            return;
        }
    };

    // Symlinks are never followed, so a cycle cannot recurse.
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            collect_markdown(&path, out);
        } else if file_type.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(PLAYBOOK_EXTENSION)
        {
            out.push(path);
        }
    }
}

/// Registers `list_playbooks` and `get_playbook`.
pub fn register_playbook_tools(registry: &mut ToolRegistry, loader: Arc<PlaybookLoader>) {
    let list_loader = loader.clone();
    registry.register(
        "list_playbooks",
        "List the investigation playbooks available on this system.",
        Vec::new(),
        move |_args: ToolArguments| {
            let loader = list_loader.clone();
            async move { ToolOutput::structured(&loader.list()) }
        },
    );

    registry.register(
        "get_playbook",
        "Get the step-by-step guidance of a playbook. Use it when a scenario needs specific investigation guidance.",
        vec![ParameterDef::required(
            "playbook_name",
            "Playbook name, e.g. 'detailed_host_investigation'",
            ParameterType::String,
        )],
        move |args: ToolArguments| {
            let loader = loader.clone();
            async move {
                let name = args.require_str("playbook_name")?;
                let content = loader
                    .get(name)
                    .map_err(|e| ToolError::Execution(e.to_string()))?;
                Ok(ToolOutput::Structured(
                    serde_json::json!({ "playbook_content": content }),
                ))
            }
        },
    );
}
