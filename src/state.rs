//! Persisted user preferences and the context object that carries them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

pub const MIN_DEFAULT_SCALE: f32 = 0.5;
pub const MAX_DEFAULT_SCALE: f32 = 16.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoubleAction {
    #[default]
    Apply,
    Edit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_scale: Option<f32>,
    pub double_action: DoubleAction,
    pub handedness: Handedness,
}

pub trait PreferenceStore {
    fn load(&self) -> Preferences;

    fn store(&mut self, preferences: &Preferences) -> std::io::Result<()>;
}

/// Preferences kept in a TOML file, rewritten on every change.
#[derive(Debug, Clone)]
pub struct TomlPreferences {
    path: PathBuf,
}

impl TomlPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("capectl")
            .join("preferences.toml")
    }
}

impl PreferenceStore for TomlPreferences {
    fn load(&self) -> Preferences {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Preferences::default();
        };
        toml::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring unreadable preferences {}: {}", self.path.display(), e);
            Preferences::default()
        })
    }

    fn store(&mut self, preferences: &Preferences) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(preferences).map_err(std::io::Error::other)?;
        fs::write(&self.path, text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    preferences: Preferences,
}

impl MemoryPreferences {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Preferences {
        self.preferences.clone()
    }

    fn store(&mut self, preferences: &Preferences) -> std::io::Result<()> {
        self.preferences = preferences.clone();
        Ok(())
    }
}

/// Preference values the engine and library read and write, behind an
/// injectable store.
pub struct SystemState {
    store: Box<dyn PreferenceStore + Send>,
    preferences: Preferences,
}

impl SystemState {
    pub fn new(store: impl PreferenceStore + Send + 'static) -> Self {
        let preferences = store.load();
        Self {
            store: Box::new(store),
            preferences,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryPreferences::default())
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Picks up changes another process made to the store.
    pub fn reload(&mut self) {
        self.preferences = self.store.load();
    }

    pub fn applied_cape(&self) -> Option<&str> {
        self.preferences.applied_cursor.as_deref()
    }

    pub fn set_applied_cape(&mut self, identifier: Option<&str>) {
        self.preferences.applied_cursor = identifier.map(str::to_string);
        self.persist();
    }

    pub fn handedness(&self) -> Handedness {
        self.preferences.handedness
    }

    pub fn set_handedness(&mut self, handedness: Handedness) {
        self.preferences.handedness = handedness;
        self.persist();
    }

    pub fn double_action(&self) -> DoubleAction {
        self.preferences.double_action
    }

    pub fn set_double_action(&mut self, action: DoubleAction) {
        self.preferences.double_action = action;
        self.persist();
    }

    /// Stored scale when it lies in [0.5, 16], otherwise 1.0.
    pub fn default_cursor_scale(&self) -> f32 {
        match self.preferences.cursor_scale {
            Some(scale) if (MIN_DEFAULT_SCALE..=MAX_DEFAULT_SCALE).contains(&scale) => scale,
            _ => 1.0,
        }
    }

    pub fn set_default_cursor_scale(&mut self, scale: f32) {
        self.preferences.cursor_scale = Some(scale);
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.store(&self.preferences) {
            warn!("Could not save preferences: {}", e);
        }
    }
}

impl std::fmt::Debug for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemState")
            .field("preferences", &self.preferences)
            .finish_non_exhaustive()
    }
}
