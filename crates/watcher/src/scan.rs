//! One-level conversation discovery under the watched root.
//!
//! Two on-disk layouts exist: a directory holding `events.jsonl` (plus an
//! optional `workspace.yaml` sidecar), or a bare `<id>.jsonl` file. A scan
//! pass synthesizes fresh [`Conversation`] values for whatever is present;
//! entries that cannot be read are logged and skipped, never fatal.

use chrono::{DateTime, Utc};
use sessionwatch_core::log::read_events;
use sessionwatch_core::workspace::read_workspace_meta;
use sessionwatch_core::{analyze, Conversation, StorageKind};
use std::path::Path;
use tracing::{debug, warn};

/// Name of the event log inside a folder conversation.
pub const EVENTS_FILE: &str = "events.jsonl";
/// Name of the optional metadata sidecar inside a folder conversation.
pub const WORKSPACE_FILE: &str = "workspace.yaml";

const JSONL_EXT: &str = ".jsonl";

/// Enumerate the root's immediate children and build conversations,
/// newest first. Hidden entries are skipped.
pub fn scan_root(root: &Path) -> Vec<Conversation> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot enumerate {}: {}", root.display(), e);
            return Vec::new();
        }
    };

    let mut conversations = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let parsed = if path.is_dir() {
            folder_conversation(&path, name)
        } else if let Some(stem) = name.strip_suffix(JSONL_EXT) {
            flat_conversation(&path, stem)
        } else {
            None
        };
        if let Some(conversation) = parsed {
            conversations.push(conversation);
        }
    }

    conversations.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    conversations
}

/// Conversations requiring attention, restricted to logs touched at or
/// after `started_at`. This watermark is what keeps historical sessions
/// from re-notifying a freshly started subscriber.
pub fn attention_list(
    conversations: &[Conversation],
    started_at: DateTime<Utc>,
) -> Vec<Conversation> {
    conversations
        .iter()
        .filter(|c| c.needs_attention() && c.last_modified >= started_at)
        .cloned()
        .collect()
}

fn folder_conversation(dir: &Path, id: &str) -> Option<Conversation> {
    let log_path = dir.join(EVENTS_FILE);
    if !log_path.is_file() {
        debug!("skipping {}: no {}", dir.display(), EVENTS_FILE);
        return None;
    }
    build_conversation(&log_path, id, StorageKind::Folder).map(|mut conversation| {
        conversation.workspace = read_workspace_meta(&dir.join(WORKSPACE_FILE));
        conversation
    })
}

fn flat_conversation(log_path: &Path, id: &str) -> Option<Conversation> {
    build_conversation(log_path, id, StorageKind::Flat)
}

fn build_conversation(log_path: &Path, id: &str, storage: StorageKind) -> Option<Conversation> {
    let events = match read_events(log_path) {
        Ok(events) => events,
        Err(e) => {
            warn!("cannot read {}: {}", log_path.display(), e);
            return None;
        }
    };
    let last_modified = file_mtime(log_path)?;

    Some(Conversation {
        id: id.to_string(),
        storage,
        event_count: events.len(),
        last_modified,
        workspace: None,
        status: analyze(&events),
    })
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionwatch_core::StatusCode;

    fn write_waiting_log(path: &Path) {
        let log = concat!(
            r#"{"type":"user-message"}"#,
            "\n",
            r#"{"type":"assistant-turn-start"}"#,
            "\n",
            r#"{"type":"assistant-message","data":{"content":"done"}}"#,
            "\n",
            r#"{"type":"assistant-turn-end"}"#,
            "\n",
        );
        std::fs::write(path, log).unwrap();
    }

    #[test]
    fn test_scan_discovers_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("conv-folder");
        std::fs::create_dir(&folder).unwrap();
        write_waiting_log(&folder.join(EVENTS_FILE));
        std::fs::write(
            folder.join(WORKSPACE_FILE),
            "repository: acme/widgets\ncwd: /home/dev/widgets\n",
        )
        .unwrap();
        write_waiting_log(&dir.path().join("conv-flat.jsonl"));

        let conversations = scan_root(dir.path());
        assert_eq!(conversations.len(), 2);

        let folder_conv = conversations.iter().find(|c| c.id == "conv-folder").unwrap();
        assert_eq!(folder_conv.storage, StorageKind::Folder);
        assert_eq!(folder_conv.event_count, 4);
        assert_eq!(folder_conv.project_name(), "acme/widgets");
        assert_eq!(folder_conv.status.code, StatusCode::WaitingForUser);

        let flat_conv = conversations.iter().find(|c| c.id == "conv-flat").unwrap();
        assert_eq!(flat_conv.storage, StorageKind::Flat);
        assert!(flat_conv.workspace.is_none());
    }

    #[test]
    fn test_scan_skips_hidden_and_unrelated_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_waiting_log(&dir.path().join(".hidden.jsonl"));
        std::fs::write(dir.path().join("notes.txt"), "not a log").unwrap();
        std::fs::create_dir(dir.path().join("empty-dir")).unwrap();

        assert!(scan_root(dir.path()).is_empty());
    }

    #[test]
    fn test_scan_tolerates_unparseable_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jsonl"), "not json\n").unwrap();
        write_waiting_log(&dir.path().join("good.jsonl"));

        let conversations = scan_root(dir.path());
        assert_eq!(conversations.len(), 2);
        let broken = conversations.iter().find(|c| c.id == "broken").unwrap();
        assert_eq!(broken.status.code, StatusCode::Empty);
        assert_eq!(broken.event_count, 0);
    }

    #[test]
    fn test_scan_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        write_waiting_log(&dir.path().join("older.jsonl"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        write_waiting_log(&dir.path().join("newer.jsonl"));

        let conversations = scan_root(dir.path());
        assert_eq!(conversations[0].id, "newer");
        assert_eq!(conversations[1].id, "older");
    }

    #[test]
    fn test_attention_list_filters_by_watermark_and_code() {
        let dir = tempfile::tempdir().unwrap();
        write_waiting_log(&dir.path().join("old.jsonl"));

        let conversations = scan_root(dir.path());
        let mtime = conversations[0].last_modified;

        // Watermark before the write: surfaced.
        let before = mtime - chrono::Duration::seconds(5);
        assert_eq!(attention_list(&conversations, before).len(), 1);

        // Watermark after the write: hidden.
        let after = mtime + chrono::Duration::seconds(5);
        assert!(attention_list(&conversations, after).is_empty());
    }

    #[test]
    fn test_attention_list_excludes_non_attention_codes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("busy.jsonl"),
            concat!(
                r#"{"type":"user-message"}"#,
                "\n",
                r#"{"type":"assistant-turn-start"}"#,
                "\n"
            ),
        )
        .unwrap();

        let conversations = scan_root(dir.path());
        assert_eq!(conversations[0].status.code, StatusCode::Processing);
        let watermark = conversations[0].last_modified - chrono::Duration::seconds(5);
        assert!(attention_list(&conversations, watermark).is_empty());
    }
}
