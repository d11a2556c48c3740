//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXFORUM_CONFIG` (environment variable)
//! 2. `~/.config/mboxforum/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxforum\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::import::linker::OrphanPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox import settings.
    pub import: ImportConfig,
    /// Remote body look-aside settings.
    pub remote: RemoteConfig,
    /// Forum store settings.
    pub store: StoreConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs, remote bodies and rewritten mailboxes.
    pub cache_dir: Option<PathBuf>,
    /// Override data directory holding the forum store.
    pub data_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox import settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Column width used when wrapping message bodies.
    pub line_width: usize,
    /// Formatted bodies longer than this (in bytes) are skipped. `None` disables the check.
    pub max_body_size: Option<usize>,
    /// What happens to replies whose parent was never seen.
    pub orphan_policy: OrphanPolicy,
    /// Literal mailing-list tags removed from subjects.
    pub strip_prefixes: Vec<String>,
}

/// Remote body look-aside settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Fetch truncated archive bodies over the network.
    pub enabled: bool,
    /// Body substring that marks a truncated archive message.
    pub marker: String,
    /// Override directory for cached remote bodies.
    pub cache_dir: Option<PathBuf>,
    /// Upper bound for a single fetch, in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent with each request.
    pub user_agent: String,
}

/// Forum store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Override path of the store snapshot file.
    pub path: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            data_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            line_width: crate::parser::format::LINE_WIDTH,
            max_body_size: None,
            orphan_policy: OrphanPolicy::default(),
            strip_prefixes: crate::parser::unpack::LIST_TAGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            marker: crate::remote::ARCHIVE_MARKER.to_string(),
            cache_dir: None,
            timeout_secs: 30,
            user_agent: concat!("mboxforum/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

/// Load configuration from an explicit path, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the standard location. Returns the path written.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXFORUM_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxforum").join("config.toml"))
}

/// Return the cache directory for logs, remote bodies and rewritten mailboxes.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxforum")
}

/// Return the data directory holding the forum store.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxforum")
}

/// Return the store snapshot path.
pub fn store_path(config: &Config) -> PathBuf {
    config
        .store
        .path
        .clone()
        .unwrap_or_else(|| data_dir(config).join("forum.db"))
}

/// Return the directory where fetched remote bodies are cached.
pub fn remote_cache_dir(config: &Config) -> PathBuf {
    config
        .remote
        .cache_dir
        .clone()
        .unwrap_or_else(|| cache_dir(config).join("remote"))
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mboxforum.log")
}
