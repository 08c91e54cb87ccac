//! The conversation value type handed to subscribers.

use crate::status::ConversationStatus;
use crate::workspace::WorkspaceInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a conversation is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// A directory holding `events.jsonl` and optionally `workspace.yaml`.
    Folder,
    /// A bare `<id>.jsonl` file.
    Flat,
}

/// One on-disk conversation as seen by a single scan pass.
///
/// Conversations are values: every scan synthesizes fresh ones, and there
/// is no identity carried across watcher restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Directory name or file stem.
    pub id: String,
    pub storage: StorageKind,
    /// Number of events parsed from the log.
    pub event_count: usize,
    /// Filesystem mtime of the log file.
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceInfo>,
    pub status: ConversationStatus,
}

impl Conversation {
    pub fn needs_attention(&self) -> bool {
        self.status.needs_attention()
    }

    /// Display name derived from workspace metadata, falling back to
    /// `"Unknown"` when none is attached.
    pub fn project_name(&self) -> String {
        self.workspace
            .as_ref()
            .map(WorkspaceInfo::project_name)
            .unwrap_or_else(|| "Unknown".to_string())
    }
}
