use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use exam_core::fs::write_private_atomic;
use exam_core::sync::DEFAULT_QUIET_PERIOD;

use crate::constants::DEFAULT_SESSION_TTL_SECONDS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamConfig {
    pub storage: StorageSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub ui: UiSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    /// SQLite database holding the papers.
    pub database: String,
    /// JSON file holding endpoint, sealed token and active folder.
    pub settings: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSection {
    pub quiet_period_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    /// How long the cache daemon keeps an unlocked token. 0 disables it.
    pub ttl_seconds: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSection {
    pub unicode: bool,
}

impl Default for UiSection {
    fn default() -> Self {
        Self { unicode: true }
    }
}

impl ExamConfig {
    pub fn new(database: PathBuf, settings: PathBuf) -> Self {
        Self {
            storage: StorageSection {
                database: database.to_string_lossy().to_string(),
                settings: settings.to_string_lossy().to_string(),
            },
            sync: SyncSection::default(),
            session: SessionSection::default(),
            ui: UiSection::default(),
        }
    }

    /// Config used when no file has been written yet.
    pub fn defaults() -> anyhow::Result<Self> {
        Ok(Self::new(default_database_path()?, default_settings_path()?))
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.sync.quiet_period_ms)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_database_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("papers.sqlite3"))
}

pub fn default_settings_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("settings.json"))
}

pub fn read_config(path: &Path) -> anyhow::Result<ExamConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &ExamConfig) -> anyhow::Result<()> {
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    write_private_atomic(path, contents.as_bytes())
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("exam"));
        }
    }
    Ok(home_dir()?.join(".config").join("exam"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("exam"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("exam"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
