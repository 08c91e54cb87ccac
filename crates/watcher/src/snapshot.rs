//! Recursive directory snapshots and their diffs.
//!
//! Kernel notifications are unreliable for writes into existing files on
//! some platforms, so change detection ultimately rests on comparing two
//! full enumerations of the tree. An entry counts as changed when its
//! mtime or size differs; content hashes are never taken.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::observer::{ChangeKind, ChangeRecord};

/// Metadata captured for one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub modified: Option<SystemTime>,
    pub size: Option<u64>,
    pub is_dir: bool,
}

/// A full enumeration of the root, keyed by path relative to it.
pub type Snapshot = HashMap<PathBuf, EntryMeta>;

/// Enumerate `root` recursively. The root itself is not an entry.
pub fn take_snapshot(root: &Path) -> io::Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    collect(root, root, &mut snapshot)?;
    Ok(snapshot)
}

fn collect(root: &Path, dir: &Path, snapshot: &mut Snapshot) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let metadata = entry.metadata()?;
        let is_dir = metadata.is_dir();
        snapshot.insert(
            relative.to_path_buf(),
            EntryMeta {
                modified: metadata.modified().ok(),
                size: Some(metadata.len()),
                is_dir,
            },
        );
        if is_dir {
            collect(root, &path, snapshot)?;
        }
    }
    Ok(())
}

/// Compare two snapshots and emit one record per changed entry.
///
/// New keys are `Created`, departed keys are `Deleted`, and keys whose
/// mtime or size moved are `Modified`. `Renamed` is reserved for a future
/// identity-preserving diff; a kernel-reported rename surfaces here as a
/// deleted/created pair.
pub fn diff_snapshots(
    old: &Snapshot,
    new: &Snapshot,
    root: &Path,
    detected_at: DateTime<Utc>,
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();

    for (relative, meta) in new {
        match old.get(relative) {
            None => changes.push(ChangeRecord {
                path: root.join(relative),
                kind: ChangeKind::Created,
                detected_at,
            }),
            Some(prev) if prev.modified != meta.modified || prev.size != meta.size => {
                changes.push(ChangeRecord {
                    path: root.join(relative),
                    kind: ChangeKind::Modified,
                    detected_at,
                })
            }
            Some(_) => {}
        }
    }

    for relative in old.keys() {
        if !new.contains_key(relative) {
            changes.push(ChangeRecord {
                path: root.join(relative),
                kind: ChangeKind::Deleted,
                detected_at,
            });
        }
    }

    changes
}
