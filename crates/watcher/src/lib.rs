//! # sessionwatch-watcher
//!
//! Watches a root directory of coding-agent conversation logs and tells a
//! subscriber which conversations currently require the user's attention.
//!
//! Pipeline: [`DirectoryObserver`] notices filesystem changes (kernel
//! notifications plus a polling fallback), the [`AttentionWatcher`]
//! debounces them, rescans the root, runs the status analyzer from
//! `sessionwatch-core` on each conversation, and dispatches the filtered
//! attention list to the subscriber. Conversations whose log predates the
//! watcher's start are never surfaced.

pub mod attention;
pub mod observer;
pub mod scan;
pub mod snapshot;

mod error;

pub use attention::{AttentionWatcher, Subscriber, WatcherConfig};
pub use error::WatchError;
pub use observer::{ChangeCallback, ChangeKind, ChangeRecord, DirectoryObserver, ObserverConfig};
