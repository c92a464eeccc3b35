//! Error types for backup operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a backup.
///
/// The first four variants come from validating a source/destination pair
/// and are raised before anything on disk is touched. The rest are raised
/// while the walk is in progress or by the job that hosts it.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source folder is missing or not a directory.
    #[error("Source folder does not exist or is not a directory: {path}")]
    NoSource { path: PathBuf },

    /// Destination folder is missing, not a directory, or not writable.
    #[error("Destination folder does not exist, is not a directory or is not writable: {path}")]
    NoDestination { path: PathBuf },

    /// Source and destination resolve to the same directory.
    #[error("Source and destination are the same folder: {path}")]
    SameDirectory { path: PathBuf },

    /// Destination lives somewhere inside the source tree.
    #[error("Destination {destination} is inside source {source_dir}")]
    IsChild {
        source_dir: PathBuf,
        destination: PathBuf,
    },

    /// A folder under the destination could not be created.
    #[error("Cannot create backup folder {path}: {source}")]
    CantCreateBackupFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure while listing, copying or stamping files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The walk was cancelled between two entries.
    #[error("Backup cancelled")]
    Cancelled,

    /// Another backup holds the run guard.
    #[error("A backup is already running")]
    AlreadyRunning,

    /// Battery is below the configured minimum.
    #[error("Battery level {level:.0}% is below the minimum of {minimum:.0}%")]
    LowBattery { level: f32, minimum: f32 },
}

impl SyncError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a backup folder error with path context.
    pub fn cant_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CantCreateBackupFolder {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was produced by pair validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoSource { .. }
                | Self::NoDestination { .. }
                | Self::SameDirectory { .. }
                | Self::IsChild { .. }
        )
    }

    /// Stable key the presentation layer translates into a user message.
    ///
    /// Nested and identical folders share a message, as do a missing
    /// destination and an uncreatable backup folder.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::NoSource { .. } => "copy_error_source",
            Self::NoDestination { .. } | Self::CantCreateBackupFolder { .. } => "copy_error_dest",
            Self::SameDirectory { .. } | Self::IsChild { .. } => "copy_error_samefolder",
            Self::LowBattery { .. } => "copy_error_battery",
            Self::AlreadyRunning => "copy_error_running",
            Self::Cancelled => "copy_error_cancelled",
            Self::Io { .. } => "copy_error",
        }
    }
}
