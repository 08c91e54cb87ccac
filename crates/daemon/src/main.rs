mod config;

use anyhow::{Context, Result};
use sessionwatch_watcher::{AttentionWatcher, ObserverConfig, Subscriber, WatcherConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sessionwatch_daemon=info".parse().unwrap())
                .add_directive("sessionwatch_watcher=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("Daemon fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("sessionwatch-daemon starting");

    let cfg = config::load_config()?;
    let root = config::resolve_root(&cfg);
    if !root.is_dir() {
        anyhow::bail!("watch root does not exist: {}", root.display());
    }

    let watcher = AttentionWatcher::new(WatcherConfig {
        debounce: Duration::from_millis(cfg.watch.debounce_ms),
        observer: ObserverConfig {
            poll_interval: Duration::from_millis(cfg.watch.poll_interval_ms),
        },
    });

    let subscriber: Subscriber = Arc::new(|conversations| {
        if conversations.is_empty() {
            info!("no conversations need attention");
            return;
        }
        for conv in &conversations {
            info!(
                id = %conv.id,
                project = %conv.project_name(),
                status = conv.status.code.as_str(),
                "{}",
                conv.status.reason
            );
        }
    });

    watcher
        .start(&root, subscriber)
        .await
        .with_context(|| format!("Failed to start watching {}", root.display()))?;

    wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");
    watcher.stop().await;

    info!("sessionwatch-daemon stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
