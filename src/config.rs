use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::TomlPreferences;

/// Where things live. Read from `config.toml`; every key is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library_dir: PathBuf,
    pub trash_dir: PathBuf,
    pub preferences_path: PathBuf,
    pub theme_dir: PathBuf,
    /// Installed cursor theme ours inherits from; also the source of the
    /// system cursors for dumps.
    pub system_theme: String,
    pub listen_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        let icons = dirs::home_dir()
            .map(|h| h.join(".icons"))
            .unwrap_or_else(|| PathBuf::from(".icons"));

        Self {
            library_dir: data.join("capectl").join("capes"),
            trash_dir: data.join("Trash").join("files"),
            preferences_path: TomlPreferences::default_path(),
            theme_dir: icons.join("capectl"),
            system_theme: "Adwaita".to_string(),
            listen_interval_ms: 2000,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("capectl")
            .join("config.toml")
    }

    /// Loads `path`, or the default location when `None`. A missing file
    /// yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}
