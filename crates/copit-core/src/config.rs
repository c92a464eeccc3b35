//! Backup job configuration.

use std::path::{Component, Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::progress::ProgressMode;

/// Folder created under the destination to hold every backed up source.
pub const DEFAULT_BACKUP_FOLDER_NAME: &str = "copit_backup";

/// Battery percentage below which a backup refuses to start.
pub const DEFAULT_MINIMUM_BATTERY_LEVEL: f32 = 5.0;

/// Configuration for a backup job.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct BackupConfig {
    /// Source folders to back up, processed in order.
    pub sources: Vec<PathBuf>,

    /// Destination root, usually removable storage.
    pub destination: PathBuf,

    /// Relative folder under the destination that receives the backups.
    #[builder(default = "DEFAULT_BACKUP_FOLDER_NAME.to_string()")]
    #[serde(default = "default_backup_folder_name")]
    pub backup_folder_name: String,

    /// How progress is reported.
    #[builder(default)]
    #[serde(default)]
    pub progress_mode: ProgressMode,

    /// Minimum battery percentage required to start.
    #[builder(default = "DEFAULT_MINIMUM_BATTERY_LEVEL")]
    #[serde(default = "default_minimum_battery_level")]
    pub minimum_battery_level: f32,
}

fn default_backup_folder_name() -> String {
    DEFAULT_BACKUP_FOLDER_NAME.to_string()
}

fn default_minimum_battery_level() -> f32 {
    DEFAULT_MINIMUM_BATTERY_LEVEL
}

impl BackupConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.sources {
            Some(ref sources) if !sources.is_empty() => {
                if sources.iter().any(|s| s.as_os_str().is_empty()) {
                    return Err("Source paths cannot be empty".to_string());
                }
            }
            _ => return Err("At least one source folder is required".to_string()),
        }

        match self.destination {
            Some(ref dest) if !dest.as_os_str().is_empty() => {}
            _ => return Err("Destination folder is required".to_string()),
        }

        if let Some(ref name) = self.backup_folder_name {
            check_backup_folder_name(name)?;
        }

        if let Some(level) = self.minimum_battery_level {
            check_minimum_battery_level(level)?;
        }

        Ok(())
    }
}

/// Check that `name` is a plain relative path that stays under the destination.
pub fn check_backup_folder_name(name: &str) -> Result<(), String> {
    if is_plain_relative(Path::new(name)) {
        Ok(())
    } else {
        Err(format!("Invalid backup folder name: {name:?}"))
    }
}

/// Check that `level` is a percentage.
pub fn check_minimum_battery_level(level: f32) -> Result<(), String> {
    if (0.0..=100.0).contains(&level) {
        Ok(())
    } else {
        Err(format!("Minimum battery level out of range: {level}"))
    }
}

impl BackupConfig {
    /// Create a new backup config builder.
    pub fn builder() -> BackupConfigBuilder {
        BackupConfigBuilder::default()
    }

    /// Create a config for a single source with default settings.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            sources: vec![source.into()],
            destination: destination.into(),
            backup_folder_name: default_backup_folder_name(),
            progress_mode: ProgressMode::default(),
            minimum_battery_level: DEFAULT_MINIMUM_BATTERY_LEVEL,
        }
    }

    /// Root folder holding all backed up sources.
    pub fn backup_root(&self) -> PathBuf {
        self.destination.join(&self.backup_folder_name)
    }

    /// Folder that receives the contents of `source`.
    ///
    /// Named after the last component of the source path, so two sources
    /// with the same folder name share a backup folder.
    pub fn backup_folder_for(&self, source: &Path) -> PathBuf {
        let root = self.backup_root();
        match source.file_name() {
            Some(name) => root.join(name),
            None => root,
        }
    }
}

/// Non-empty relative path made only of normal components.
fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
