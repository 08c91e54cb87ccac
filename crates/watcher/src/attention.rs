//! The attention watcher: observes, debounces, rescans, dispatches.
//!
//! One scheduler task owns the observer and is the only caller of the
//! subscriber, so subscriber invocations are totally ordered and never
//! concurrent. Public operations serialize on the watcher's state lock.

use chrono::{DateTime, Utc};
use sessionwatch_core::Conversation;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::WatchError;
use crate::observer::{ChangeCallback, ChangeRecord, DirectoryObserver, ObserverConfig};
use crate::scan::{attention_list, scan_root};

/// Receives the current attention list after each coalesced change burst.
/// The list may be empty; deliveries are serialized.
pub type Subscriber = Arc<dyn Fn(Vec<Conversation>) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet interval a change burst must satisfy before a rescan runs.
    pub debounce: Duration,
    pub observer: ObserverConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            observer: ObserverConfig::default(),
        }
    }
}

#[derive(Default)]
struct Inner {
    root: Option<PathBuf>,
    started_at: Option<DateTime<Utc>>,
    shutdown: Option<watch::Sender<bool>>,
    scheduler: Option<JoinHandle<()>>,
}

/// Watches a session-state root and surfaces conversations that newly
/// require the user's attention.
///
/// The `started_at` watermark is recorded by [`start`] and cleared by
/// [`stop`]: conversations whose log mtime predates it are invisible to
/// this subscriber, which keeps historical sessions quiet on launch.
///
/// [`start`]: AttentionWatcher::start
/// [`stop`]: AttentionWatcher::stop
pub struct AttentionWatcher {
    config: WatcherConfig,
    inner: Arc<Mutex<Inner>>,
}

impl Default for AttentionWatcher {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

impl AttentionWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Begin watching `root`. An already-active watcher is stopped first,
    /// so the watermark is always fresh. Fails only with the observer's
    /// start errors.
    pub async fn start(&self, root: &Path, subscriber: Subscriber) -> Result<(), WatchError> {
        let mut inner = self.inner.lock().await;
        stop_locked(&mut inner).await;

        let (change_tx, change_rx) = mpsc::unbounded_channel::<Vec<ChangeRecord>>();
        let callback: ChangeCallback = Arc::new(move |changes| {
            let _ = change_tx.send(changes.to_vec());
        });

        let mut observer = DirectoryObserver::new(self.config.observer.clone());
        observer.start(root, callback)?;

        let started_at = Utc::now();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = tokio::spawn(scheduler_loop(
            observer,
            root.to_path_buf(),
            started_at,
            subscriber,
            self.config.debounce,
            change_rx,
            shutdown_rx,
        ));

        info!("watching {}", root.display());
        inner.root = Some(root.to_path_buf());
        inner.started_at = Some(started_at);
        inner.shutdown = Some(shutdown_tx);
        inner.scheduler = Some(scheduler);
        Ok(())
    }

    /// Stop watching. Idempotent. An in-flight subscriber call completes;
    /// after this returns no further calls occur.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        stop_locked(&mut inner).await;
    }

    /// Snapshot of conversations currently requiring attention, filtered
    /// by the start-time watermark. Empty when not active.
    pub async fn current_attention_list(&self) -> Vec<Conversation> {
        let inner = self.inner.lock().await;
        match (inner.root.as_deref(), inner.started_at) {
            (Some(root), Some(started_at)) => attention_list(&scan_root(root), started_at),
            _ => Vec::new(),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.inner.lock().await.started_at.is_some()
    }
}

async fn stop_locked(inner: &mut Inner) {
    inner.root = None;
    inner.started_at = None;
    if let Some(shutdown) = inner.shutdown.take() {
        let _ = shutdown.send(true);
    }
    if let Some(scheduler) = inner.scheduler.take() {
        let _ = scheduler.await;
    }
}

/// Debounce loop: every change burst re-arms one deadline; when it fires,
/// drain the observer, rescan, and deliver exactly one attention list.
async fn scheduler_loop(
    mut observer: DirectoryObserver,
    root: PathBuf,
    started_at: DateTime<Utc>,
    subscriber: Subscriber,
    debounce: Duration,
    mut change_rx: mpsc::UnboundedReceiver<Vec<ChangeRecord>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            changes = change_rx.recv() => {
                match changes {
                    Some(changes) => {
                        debug!("{} change(s), debouncing", changes.len());
                        deadline = Some(Instant::now() + debounce);
                    }
                    None => break,
                }
            }
            _ = sleep_until_opt(deadline), if deadline.is_some() => {
                deadline = None;
                let drained = observer.drain();
                debug!("rescanning after {} coalesced change(s)", drained.len());

                let conversations = scan_root(&root);
                let attention = attention_list(&conversations, started_at);
                if !attention.is_empty() {
                    info!("{} conversation(s) need attention", attention.len());
                }
                subscriber(attention);
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    observer.stop();
    debug!("scheduler for {} stopped", root.display());
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
