use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

const SETTINGS_FILE: &str = "settings.toml";
const APP_DIR: &str = "dock-peek";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("No configuration directory available on this system")]
    NoConfigDir,
}

/// User preferences read by the dispatcher and registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch; when off every click passes through
    pub enabled: bool,
    /// Longer edge of a thumbnail, in points
    pub thumbnail_max_size: u32,
    pub show_titles: bool,
    /// Open previews by resting the pointer on an icon
    pub hover_enabled: bool,
    pub hover_delay_ms: u64,
    /// List minimized windows alongside on-screen ones
    pub include_minimized: bool,
    /// Bundle identifiers (or application names) that never get a preview
    pub excluded_bundle_ids: BTreeSet<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            thumbnail_max_size: 300,
            show_titles: true,
            hover_enabled: false,
            hover_delay_ms: 500,
            include_minimized: true,
            excluded_bundle_ids: BTreeSet::new(),
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Read-only snapshot access to the current settings
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> Settings;
}

/// In-process settings, replaceable at runtime
#[derive(Debug, Default)]
pub struct StaticSettings {
    current: RwLock<Settings>,
}

impl StaticSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }

    pub fn set(&self, settings: Settings) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.current.write().unwrap_or_else(|e| e.into_inner()));
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> Settings {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// `settings.toml` on disk with an in-memory copy
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// `~/Library/Application Support/dock-peek/settings.toml` on macOS
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Self::open(Self::default_path()?)
    }

    /// Load `path`, using defaults when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = Self::read(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(settings),
        })
    }

    fn read(path: &Path) -> Result<Settings, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "settings file missing, using defaults");
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(path)?;
        Settings::from_toml(&content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file. On error the previous settings stay in effect.
    pub fn reload(&self) -> Result<Settings, SettingsError> {
        let settings = Self::read(&self.path)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings.clone();
        info!(path = %self.path.display(), "settings reloaded");
        Ok(settings)
    }

    /// Persist `settings` atomically and make them current
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = settings.to_toml()?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(temp_path, &self.path)?;

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings.clone();
        Ok(())
    }

    /// Write the default settings if no file exists yet
    pub fn initialize(&self) -> Result<bool, SettingsError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&Settings::default())?;
        Ok(true)
    }
}

impl SettingsProvider for SettingsStore {
    fn settings(&self) -> Settings {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings = Settings::from_toml(
            r#"
            hover_enabled = true
            excluded_bundle_ids = ["com.apple.finder"]
            "#,
        )
        .unwrap();

        assert!(settings.hover_enabled);
        assert_eq!(settings.thumbnail_max_size, 300);
        assert!(settings.excluded_bundle_ids.contains("com.apple.finder"));
    }

    #[test]
    fn store_uses_defaults_when_missing_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dock-peek").join(SETTINGS_FILE);
        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.settings(), Settings::default());

        assert!(store.initialize().unwrap());
        assert!(!store.initialize().unwrap());

        fs::write(&path, "enabled = false\nthumbnail_max_size = 200\n").unwrap();
        let reloaded = store.reload().unwrap();
        assert!(!reloaded.enabled);
        assert_eq!(store.settings().thumbnail_max_size, 200);
    }

    #[test]
    fn failed_reload_keeps_previous_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "show_titles = false\n").unwrap();
        let store = SettingsStore::open(&path).unwrap();

        fs::write(&path, "show_titles = [not toml").unwrap();
        assert!(matches!(store.reload(), Err(SettingsError::Parse(_))));
        assert!(!store.settings().show_titles);
    }

    #[test]
    fn save_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open(dir.path().join(SETTINGS_FILE)).unwrap();
        let mut settings = Settings::default();
        settings.excluded_bundle_ids.insert("com.apple.Terminal".into());
        store.save(&settings).unwrap();

        let reopened = SettingsStore::open(store.path()).unwrap();
        assert_eq!(reopened.settings(), settings);
    }
}
