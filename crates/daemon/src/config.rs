use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conventional location of the agent's per-conversation session state.
const DEFAULT_ROOT: &str = "~/.copilot/session-state";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub watch: WatchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Root directory to watch. Defaults to the agent's session-state
    /// convention when unset.
    pub root: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            root: None,
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("sessionwatch"))
}

/// Get the daemon config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load daemon config from disk; a missing file yields defaults.
pub fn load_config() -> Result<DaemonConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
}

/// Resolve the watch root from config, falling back to the agent's
/// session-state convention.
pub fn resolve_root(config: &DaemonConfig) -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let raw = config.watch.root.as_deref().unwrap_or(DEFAULT_ROOT);
    PathBuf::from(shellexpand(raw, &home))
}

/// Simple ~ expansion
fn shellexpand(path: &str, home: &Path) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{}", home.display(), rest)
    } else {
        path.to_string()
    }
}
