//! Folder synchronization engine for copit.
//!
//! This crate copies a source folder tree into a destination, skipping
//! files that are already up to date, and reports progress as it goes.
//!
//! # Overview
//!
//! - **Validation** of the source/destination pair before any I/O mutation
//! - **Incremental copy** deciding per file on modification time and size
//! - **Directory-scoped progress** with an optional whole-tree pre-pass
//! - **Backup jobs** running on a background worker with a run guard,
//!   battery gate and cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! let stats = copit_sync::copy_folder(
//!     Path::new("/sdcard/DCIM/Camera"),
//!     Path::new("/storage/usbdisk/backup"),
//!     &mut |processed: usize, total: usize| println!("{processed}/{total}"),
//! )
//! .unwrap();
//!
//! println!("Copied {} files", stats.files_copied);
//! ```
//!
//! # Background jobs
//!
//! ```rust,no_run
//! use copit_core::BackupConfig;
//! use copit_sync::{BackupEvent, BackupJob, RunGuard};
//!
//! # async fn run() {
//! let guard = RunGuard::new();
//! let config = BackupConfig::new("/sdcard/DCIM/Camera", "/storage/usbdisk");
//! let mut events = BackupJob::new(config).start(guard);
//!
//! while let Some(event) = events.recv().await {
//!     if let BackupEvent::Finished(result) = event {
//!         println!("done: {}", result.is_ok());
//!     }
//! }
//! # }
//! ```

mod engine;
mod guard;
mod job;
mod progress;
mod validate;

pub use engine::{SyncEngine, SyncStats, copy_folder, needs_copy};
pub use guard::{RunGuard, RunTicket};
pub use job::{
    BackupEvent, BackupJob, BackupProgress, BackupReport, SourceReport, create_backup_folder,
};
pub use progress::{OverallProgress, count_entries};
pub use validate::{FolderPair, validate, validate_backup_folder};

// Re-export core types for convenience
pub use copit_core::{ProgressSink, ProgressState, SyncError};

/// Default channel buffer size for backup events.
pub const EVENT_CHANNEL_SIZE: usize = 100;
