//! Core types for copit.
//!
//! This crate provides the data structures shared by the sync engine and
//! the command-line front end: progress and error types, backup
//! configuration, the well-known media sources of a device, and the
//! persisted user settings with their versioned migrations.

mod config;
pub mod device;
mod error;
pub mod media;
pub mod migration;
mod progress;
mod settings;
mod source;

pub use config::{
    BackupConfig, BackupConfigBuilder, BackupConfigBuilderError, DEFAULT_BACKUP_FOLDER_NAME,
    DEFAULT_MINIMUM_BATTERY_LEVEL, check_backup_folder_name, check_minimum_battery_level,
};
pub use error::SyncError;
pub use media::{MediaCount, MediaKind, count_media};
pub use progress::{NoProgress, ProgressMode, ProgressSink, ProgressState};
pub use settings::{Settings, SettingsError};
pub use source::{MediaSource, SOURCE_KEY_PREFIX};
