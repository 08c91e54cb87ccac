use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by `start`. Everything after a successful start is
/// absorbed internally: a failed snapshot tick retries on the next tick,
/// and unreadable conversations are skipped by the scan.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("not a directory: {0}")]
    RootNotADirectory(PathBuf),

    #[error("cannot open root for change notifications: {0}")]
    CannotOpenRoot(#[source] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
