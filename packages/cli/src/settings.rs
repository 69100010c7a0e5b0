//! Persistent key-value settings shared by the CLI and the extension.
//!
//! Stored as pretty-printed JSON in `$NOTION_MAP_HOME/settings.json`
//! (default `~/.notion_map`). A missing file reads as empty settings.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notion_map_notion::DatabaseSummary;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, VariantNames};

/// File name inside the settings directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Errors reading or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Filesystem failure.
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON.
    #[error("Corrupt settings file: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither `NOTION_MAP_HOME` nor `HOME` is set.
    #[error("Cannot locate settings directory: set NOTION_MAP_HOME")]
    NoHome,
}

/// Settings that can be read and written by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum SettingKey {
    /// Database used when a command is given no `--database`.
    SelectedDatabaseId,
    /// Release the user chose not to be notified about.
    DismissedUpdateVersion,
}

/// Everything the settings file holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// See [`SettingKey::SelectedDatabaseId`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_database_id: Option<String>,
    /// Databases from the last `databases` listing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cached_databases: Vec<DatabaseSummary>,
    /// When `cached_databases` was refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub databases_cached_at: Option<DateTime<Utc>>,
    /// See [`SettingKey::DismissedUpdateVersion`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_update_version: Option<String>,
}

impl Settings {
    const fn slot(&mut self, key: SettingKey) -> &mut Option<String> {
        match key {
            SettingKey::SelectedDatabaseId => &mut self.selected_database_id,
            SettingKey::DismissedUpdateVersion => &mut self.dismissed_update_version,
        }
    }

    /// Value of one key.
    #[must_use]
    pub fn get(&self, key: SettingKey) -> Option<&str> {
        match key {
            SettingKey::SelectedDatabaseId => self.selected_database_id.as_deref(),
            SettingKey::DismissedUpdateVersion => self.dismissed_update_version.as_deref(),
        }
    }

    /// Sets one key. An empty value clears it.
    pub fn set(&mut self, key: SettingKey, value: &str) {
        *self.slot(key) = (!value.is_empty()).then(|| value.to_owned());
    }

    /// Clears one key.
    pub fn unset(&mut self, key: SettingKey) {
        *self.slot(key) = None;
    }

    /// Replaces the cached database list.
    pub fn cache_databases(&mut self, databases: Vec<DatabaseSummary>, now: DateTime<Utc>) {
        self.cached_databases = databases;
        self.databases_cached_at = Some(now);
    }
}

/// Reads and writes [`Settings`] in one directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store rooted at `dir`.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(SETTINGS_FILE),
        }
    }

    /// Store rooted at `NOTION_MAP_HOME`, else `$HOME/.notion_map`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NoHome`] if neither variable is set.
    pub fn from_env() -> Result<Self, SettingsError> {
        let dir = std::env::var_os("NOTION_MAP_HOME")
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".notion_map")))
            .ok_or(SettingsError::NoHome)?;
        Ok(Self::new(&dir))
    }

    /// Path of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the settings, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file cannot be written.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        log::debug!("Wrote {}", self.path.display());
        Ok(())
    }

    /// Loads, applies `f`, and saves.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if loading or saving fails.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}
