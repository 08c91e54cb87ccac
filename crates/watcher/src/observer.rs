//! Recursive directory observation.
//!
//! Two sources feed one diff routine: a kernel watcher on the root (fast,
//! but misses writes into existing files within deep subtrees on some
//! platforms) and a periodic snapshot poll (slow, but complete). Kernel
//! firings only schedule an immediate snapshot diff; every emitted change
//! therefore comes out of the same mtime/size comparison, which also
//! suppresses duplicate reports across the two sources.

use chrono::{DateTime, Utc};
use notify::{RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::WatchError;
use crate::snapshot::{diff_snapshots, take_snapshot, Snapshot};

/// A single observed filesystem change.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// Absolute path of the affected entry.
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// Reserved for an identity-preserving diff. Currently never emitted;
    /// renames surface as a deleted/created pair.
    Renamed,
}

/// Invoked with each batch of fresh changes. Runs on the observer's poll
/// task; keep it cheap.
pub type ChangeCallback = Arc<dyn Fn(&[ChangeRecord]) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Interval of the snapshot poll fallback.
    pub poll_interval: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Watches one root directory and reports deduplicated change records.
///
/// Must be started from within a tokio runtime. Changes accumulate in an
/// internal buffer (last report wins per path) until [`drain`] is called;
/// the `on_change` callback additionally fires per diff pass.
///
/// [`drain`]: DirectoryObserver::drain
pub struct DirectoryObserver {
    config: ObserverConfig,
    buffer: Arc<Mutex<HashMap<PathBuf, ChangeRecord>>>,
    runtime: Option<ObserverRuntime>,
}

struct ObserverRuntime {
    // Held only to keep the kernel subscription alive.
    _watcher: notify::RecommendedWatcher,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl DirectoryObserver {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            buffer: Arc::new(Mutex::new(HashMap::new())),
            runtime: None,
        }
    }

    /// Begin observing `root`. Fails when the root is missing or not a
    /// directory, or when the kernel watch cannot be registered; nothing
    /// after a successful return fails loudly.
    pub fn start(&mut self, root: &Path, on_change: ChangeCallback) -> Result<(), WatchError> {
        self.stop();

        let is_dir = std::fs::metadata(root).map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(WatchError::RootNotADirectory(root.to_path_buf()));
        }
        // Resolve aliases up front so snapshot keys are stable even when
        // the root is reached through a symlink.
        let root = std::fs::canonicalize(root)?;

        let (kick_tx, kick_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| match result {
                Ok(_) => {
                    let _ = kick_tx.send(());
                }
                Err(e) => warn!("kernel watcher error: {}", e),
            },
        )
        .map_err(WatchError::CannotOpenRoot)?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(WatchError::CannotOpenRoot)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            root,
            self.config.poll_interval,
            kick_rx,
            shutdown_rx,
            Arc::clone(&self.buffer),
            on_change,
        ));

        self.runtime = Some(ObserverRuntime {
            _watcher: watcher,
            task,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Stop observing. Idempotent; pending buffered changes survive until
    /// the next [`drain`](DirectoryObserver::drain).
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown.send(true);
            runtime.task.abort();
        }
    }

    /// Return all buffered changes and reset the buffer. Multiple reports
    /// for the same path have already collapsed to the most recent one.
    pub fn drain(&self) -> Vec<ChangeRecord> {
        let mut buffer = self.buffer.lock().expect("observer buffer poisoned");
        let mut records: Vec<ChangeRecord> = buffer.drain().map(|(_, r)| r).collect();
        records.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then(a.path.cmp(&b.path)));
        records
    }

    pub fn is_active(&self) -> bool {
        self.runtime.is_some()
    }
}

impl Drop for DirectoryObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single writer of the previous-snapshot state: ticks on the poll
/// interval, and immediately on every kernel kick.
async fn poll_loop(
    root: PathBuf,
    poll_interval: Duration,
    mut kick_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
    buffer: Arc<Mutex<HashMap<PathBuf, ChangeRecord>>>,
    on_change: ChangeCallback,
) {
    let mut previous = match take_snapshot(&root) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!("initial snapshot of {} failed: {}", root.display(), e);
            Snapshot::new()
        }
    };

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the baseline above covers it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            kick = kick_rx.recv() => {
                if kick.is_none() {
                    break;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }

        match take_snapshot(&root) {
            Ok(current) => {
                let changes = diff_snapshots(&previous, &current, &root, Utc::now());
                previous = current;
                if changes.is_empty() {
                    continue;
                }
                {
                    let mut buf = buffer.lock().expect("observer buffer poisoned");
                    for change in &changes {
                        buf.insert(change.path.clone(), change.clone());
                    }
                }
                on_change(&changes);
            }
            // Transient enumeration failure: this tick yields nothing,
            // the next tick retries against the old snapshot.
            Err(e) => debug!("snapshot of {} failed: {}", root.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> ObserverConfig {
        ObserverConfig {
            poll_interval: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_start_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut observer = DirectoryObserver::new(fast_config());
        let err = observer
            .start(&dir.path().join("absent"), Arc::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, WatchError::RootNotADirectory(_)));
    }

    #[tokio::test]
    async fn test_start_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("root.txt");
        std::fs::write(&file, "x").unwrap();
        let mut observer = DirectoryObserver::new(fast_config());
        let err = observer.start(&file, Arc::new(|_| {})).unwrap_err();
        assert!(matches!(err, WatchError::RootNotADirectory(_)));
    }

    #[tokio::test]
    async fn test_detects_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);

        let mut observer = DirectoryObserver::new(fast_config());
        observer
            .start(
                dir.path(),
                Arc::new(move |changes| {
                    seen.fetch_add(changes.len(), Ordering::SeqCst);
                }),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.path().join("fresh.jsonl"), "{}\n").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(counter.load(Ordering::SeqCst) >= 1);
        let drained = observer.drain();
        assert!(drained
            .iter()
            .any(|c| c.kind == ChangeKind::Created && c.path.ends_with("fresh.jsonl")));
        observer.stop();
    }

    #[tokio::test]
    async fn test_detects_append_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{}\n").unwrap();

        let mut observer = DirectoryObserver::new(fast_config());
        observer.start(dir.path(), Arc::new(|_| {})).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"more\":true}\n").unwrap();
        drop(file);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let drained = observer.drain();
        assert!(drained
            .iter()
            .any(|c| c.kind == ChangeKind::Modified && c.path.ends_with("log.jsonl")));
        observer.stop();
    }

    #[tokio::test]
    async fn test_drain_collapses_repeat_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        let mut observer = DirectoryObserver::new(fast_config());
        observer.start(dir.path(), Arc::new(|_| {})).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&path, "{}\n").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        std::fs::write(&path, "{}\n{}\n").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let drained = observer.drain();
        let for_path: Vec<_> = drained.iter().filter(|c| c.path == path || c.path.ends_with("log.jsonl")).collect();
        assert_eq!(for_path.len(), 1);

        // Buffer was reset.
        assert!(observer.drain().is_empty());
        observer.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut observer = DirectoryObserver::new(fast_config());
        observer.start(dir.path(), Arc::new(|_| {})).unwrap();
        assert!(observer.is_active());
        observer.stop();
        observer.stop();
        assert!(!observer.is_active());
    }
}
