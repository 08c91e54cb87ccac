//! Workspace metadata sidecar parsing.
//!
//! Next to a conversation's event log the agent may drop a `workspace.yaml`
//! with a handful of `key: value` lines. Despite the extension it is not
//! general YAML; only single-line scalar entries occur, so it is parsed as
//! a line format. Only `repository`, `cwd` and `summary` are consumed;
//! other keys are tolerated and ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Matches `key: value` where key is ASCII letters/digits/underscore.
/// Only the first colon splits; colons in the value are preserved.
static META_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_]+):(.*)$").unwrap());

/// Optional workspace information attached to a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl WorkspaceInfo {
    /// Display name: the repository if set, else the last component of the
    /// working directory, else `"Unknown"`.
    pub fn project_name(&self) -> String {
        if let Some(repo) = self.repository.as_deref().filter(|r| !r.is_empty()) {
            return repo.to_string();
        }
        if let Some(cwd) = self.working_directory.as_deref().filter(|c| !c.is_empty()) {
            if let Some(name) = Path::new(cwd).file_name().and_then(|n| n.to_str()) {
                return name.to_string();
            }
            return cwd.to_string();
        }
        "Unknown".to_string()
    }
}

/// Parse workspace metadata content. Empty content yields a record with
/// all fields absent.
pub fn parse_workspace_meta(content: &str) -> WorkspaceInfo {
    let mut info = WorkspaceInfo::default();
    for line in content.lines() {
        let Some(caps) = META_LINE_RE.captures(line) else {
            continue;
        };
        let key = &caps[1];
        let value = caps[2].trim();
        match key {
            "repository" => info.repository = Some(value.to_string()),
            "cwd" => info.working_directory = Some(value.to_string()),
            "summary" => info.summary = Some(value.to_string()),
            _ => {}
        }
    }
    info
}

/// Read and parse a metadata file. A missing or unreadable file yields
/// `None`.
pub fn read_workspace_meta(path: &Path) -> Option<WorkspaceInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    Some(parse_workspace_meta(&content))
}
