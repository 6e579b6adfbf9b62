use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bridge configuration stored at `~/.unqperp/config.json`.
///
/// Every field has a default, so a partial (or missing) file is fine.
/// Command-line flags are applied on top by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    // Listener
    pub host: String,
    pub port: u16,

    /// Root of all relative path resolution. `None` means the process
    /// working directory at startup.
    pub base_dir: Option<PathBuf>,

    // Process execution
    pub exec_timeout_secs: u64,
    pub max_concurrent_processes: usize,
    pub python_bin: String,
    pub node_bin: String,
    pub npm_bin: String,
    pub git_bin: String,

    // Tunnel
    pub tunnel_enabled: bool,
    pub tunnel_bin: String,
    pub tunnel_detect_secs: u64,
    pub tunnel_url_file: PathBuf,

    // Filesystem views
    pub tree_max_depth: usize,
    pub search_include_hidden: bool,
    pub rename_overwrite: bool,

    // General
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            base_dir: None,
            exec_timeout_secs: 30,
            max_concurrent_processes: 8,
            python_bin: "python3".into(),
            node_bin: "node".into(),
            npm_bin: "npm".into(),
            git_bin: "git".into(),
            tunnel_enabled: true,
            tunnel_bin: "cloudflared".into(),
            tunnel_detect_secs: 15,
            tunnel_url_file: PathBuf::from(".tunnel_url"),
            tree_max_depth: 3,
            search_include_hidden: true,
            rename_overwrite: true,
            log_level: "info".into(),
        }
    }
}

impl BridgeConfig {
    /// Returns the config directory: `~/.unqperp/`
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".unqperp"))
    }

    /// Returns the config file path: `~/.unqperp/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.unqperp/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Load the config from `path`. A missing file yields defaults; a file
    /// that cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Corrupt config file: {}", path.display()))
    }

    /// Save the config as pretty-printed JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Resolve the base directory to an absolute, canonical path.
    ///
    /// Falls back to the current working directory when unset.
    pub fn resolve_base_dir(&self) -> Result<PathBuf> {
        let dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        anyhow::ensure!(dir.is_dir(), "Base directory is not a directory: {}", dir.display());
        dir.canonicalize()
            .with_context(|| format!("Cannot resolve base directory: {}", dir.display()))
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn tunnel_detect_window(&self) -> Duration {
        Duration::from_secs(self.tunnel_detect_secs)
    }
}
