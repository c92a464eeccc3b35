//! Persistent user settings stored in a TOML file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    BackupConfig, DEFAULT_BACKUP_FOLDER_NAME, DEFAULT_MINIMUM_BATTERY_LEVEL,
    check_backup_folder_name, check_minimum_battery_level,
};
use crate::migration::{CURRENT_VERSION, migrate};
use crate::progress::ProgressMode;
use crate::source::MediaSource;

/// Errors reading or writing the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// No platform config directory could be found.
    #[error("No config directory available")]
    NoConfigDir,

    /// Reading or writing the file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid settings TOML.
    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Settings could not be encoded.
    #[error("Cannot encode settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Settings do not describe a runnable backup.
    #[error("Incomplete settings: {0}")]
    Incomplete(String),

    /// A setting holds a value no backup can run with.
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Persistent user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Schema version, 0 when the file has never been written.
    pub version: u32,
    /// Destination root chosen by the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Root that well-known sources are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
    /// Selection flag per well-known source, keyed by `source_<name>`.
    pub sources: BTreeMap<String, bool>,
    /// Folders picked by hand, backed up alongside the selected sources.
    pub extra_sources: Vec<PathBuf>,
    /// Folder created under the destination for backups.
    pub backup_folder_name: String,
    /// Minimum battery percentage to start a backup.
    pub minimum_battery_level: f32,
    /// How progress is reported.
    pub progress_mode: ProgressMode,
    /// When the last backup finished successfully.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 0,
            destination: None,
            storage_root: None,
            sources: default_source_flags(),
            extra_sources: Vec::new(),
            backup_folder_name: DEFAULT_BACKUP_FOLDER_NAME.to_string(),
            minimum_battery_level: DEFAULT_MINIMUM_BATTERY_LEVEL,
            progress_mode: ProgressMode::default(),
            last_backup: None,
        }
    }
}

/// Selection flags for every known source, at their default values.
fn default_source_flags() -> BTreeMap<String, bool> {
    MediaSource::all()
        .map(|s| (s.key(), s.checked_by_default()))
        .collect()
}

impl Settings {
    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("copit").join("settings.toml"))
    }

    /// Load settings from the default location.
    pub fn load() -> Result<Self, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load settings from `path`, upgrading older schemas.
    ///
    /// A missing file yields first-run defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        settings.upgrade();
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save settings to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Bring the settings up to the current schema version.
    ///
    /// Returns whether any migration ran.
    pub fn upgrade(&mut self) -> bool {
        if self.version >= CURRENT_VERSION {
            return false;
        }
        let from = self.version;
        !migrate(self, from, CURRENT_VERSION).is_empty()
    }

    /// Check whether these settings were never persisted.
    pub fn is_first_run(&self) -> bool {
        self.last_backup.is_none() && self.destination.is_none()
    }

    /// Well-known sources the user selected.
    ///
    /// Flags for sources this version does not know are ignored.
    pub fn selected_sources(&self) -> Vec<MediaSource> {
        self.sources
            .iter()
            .filter(|&(_, &enabled)| enabled)
            .filter_map(|(key, _)| MediaSource::from_key(key))
            .collect()
    }

    /// Select or deselect a well-known source.
    pub fn set_source(&mut self, source: MediaSource, enabled: bool) {
        self.sources.insert(source.key(), enabled);
    }

    /// Effective storage root.
    pub fn storage_root(&self) -> PathBuf {
        self.storage_root
            .clone()
            .unwrap_or_else(crate::device::default_storage_root)
    }

    /// Folders to back up: existing locations of selected sources, then
    /// the hand-picked extras.
    pub fn source_folders(&self) -> Vec<PathBuf> {
        let root = self.storage_root();
        let mut folders: Vec<PathBuf> = self
            .selected_sources()
            .iter()
            .flat_map(|s| s.active_paths(&root))
            .collect();
        for extra in &self.extra_sources {
            if !folders.contains(extra) {
                folders.push(extra.clone());
            }
        }
        folders
    }

    /// Record a successful backup.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_backup = Some(at);
    }

    /// Check the values a backup config would reject.
    ///
    /// Unlike [`Settings::backup_config`], a missing destination or an empty
    /// source selection is accepted.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_backup_folder_name(&self.backup_folder_name).map_err(SettingsError::Invalid)?;
        check_minimum_battery_level(self.minimum_battery_level).map_err(SettingsError::Invalid)
    }

    /// Build a backup config from these settings.
    pub fn backup_config(&self) -> Result<BackupConfig, SettingsError> {
        let destination = self
            .destination
            .clone()
            .ok_or_else(|| SettingsError::Incomplete("no destination folder".to_string()))?;

        BackupConfig::builder()
            .sources(self.source_folders())
            .destination(destination)
            .backup_folder_name(self.backup_folder_name.clone())
            .progress_mode(self.progress_mode)
            .minimum_battery_level(self.minimum_battery_level)
            .build()
            .map_err(|e| SettingsError::Incomplete(e.to_string()))
    }
}
