//! Recursive folder synchronization.

use std::fs::{self, Metadata};
use std::path::Path;

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use copit_core::{ProgressSink, SyncError};

use crate::validate::validate;

/// Statistics of a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Files whose bytes were written to the destination.
    pub files_copied: u64,
    /// Files already up to date at the destination.
    pub files_skipped: u64,
    /// Directories walked below the source root.
    pub dirs_visited: u64,
    /// Entries that are neither files nor directories.
    pub special_skipped: u64,
    /// Bytes written to the destination.
    pub bytes_copied: u64,
}

impl SyncStats {
    /// Entries visited, i.e. progress events emitted.
    pub fn entries(&self) -> u64 {
        self.files_copied + self.files_skipped + self.dirs_visited + self.special_skipped
    }

    /// Fold another walk's statistics into this one.
    pub fn merge(&mut self, other: &SyncStats) {
        self.files_copied += other.files_copied;
        self.files_skipped += other.files_skipped;
        self.dirs_visited += other.dirs_visited;
        self.special_skipped += other.special_skipped;
        self.bytes_copied += other.bytes_copied;
    }
}

/// Copies a folder tree, skipping files that are already up to date.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    cancel: Option<CancellationToken>,
}

impl SyncEngine {
    /// Create an engine that cannot be cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that stops at the next entry once `token` fires.
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }

    /// Validate the pair, then copy `source` into `dest`.
    ///
    /// `sink` receives one `(processed, total)` event per direct child of
    /// every directory, in depth-first pre-order. A directory's own event
    /// comes after the events of everything below it. The first error
    /// aborts the walk and leaves whatever was already copied in place.
    pub fn copy_folder(
        &self,
        source: &Path,
        dest: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<SyncStats, SyncError> {
        validate(source, dest)?;

        let mut stats = SyncStats::default();
        self.walk(source, dest, sink, &mut stats)?;

        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            copied = stats.files_copied,
            skipped = stats.files_skipped,
            bytes = stats.bytes_copied,
            "folder synchronized"
        );

        Ok(stats)
    }

    fn walk(
        &self,
        src_dir: &Path,
        dest_dir: &Path,
        sink: &mut dyn ProgressSink,
        stats: &mut SyncStats,
    ) -> Result<(), SyncError> {
        let entries = fs::read_dir(src_dir)
            .and_then(|rd| rd.collect::<Result<Vec<_>, _>>())
            .map_err(|e| SyncError::io(src_dir, e))?;

        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            self.check_cancelled()?;

            let src_path = entry.path();
            let dest_path = dest_dir.join(entry.file_name());
            let metadata = entry_metadata(&src_path)?;

            if metadata.is_dir() {
                ensure_dir(&dest_path)?;
                self.walk(&src_path, &dest_path, sink, stats)?;
                stats.dirs_visited += 1;
            } else if metadata.is_file() {
                if needs_copy(&metadata, &dest_path) {
                    copy_file(&src_path, &dest_path, &metadata)?;
                    stats.files_copied += 1;
                    stats.bytes_copied += metadata.len();
                } else {
                    tracing::trace!(path = %src_path.display(), "up to date");
                    stats.files_skipped += 1;
                }
            } else {
                tracing::warn!(
                    path = %src_path.display(),
                    "skipping entry that is not a file or directory"
                );
                stats.special_skipped += 1;
            }

            sink.on_progress(index + 1, total);
        }

        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        match self.cancel {
            Some(ref token) if token.is_cancelled() => Err(SyncError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Validate the pair, then copy `source` into `dest`.
///
/// Shorthand for [`SyncEngine::copy_folder`] on an engine without
/// cancellation.
pub fn copy_folder(
    source: &Path,
    dest: &Path,
    sink: &mut dyn ProgressSink,
) -> Result<SyncStats, SyncError> {
    SyncEngine::new().copy_folder(source, dest, sink)
}

/// Decide whether `dest` must be (re)written from a source with `src_meta`.
///
/// The destination is up to date only if it exists with the same
/// modification time and the same length. Contents are never compared.
pub fn needs_copy(src_meta: &Metadata, dest: &Path) -> bool {
    let Ok(dest_meta) = fs::metadata(dest) else {
        return true;
    };

    let src_mtime = FileTime::from_last_modification_time(src_meta);
    let dest_mtime = FileTime::from_last_modification_time(&dest_meta);
    src_mtime != dest_mtime || src_meta.len() != dest_meta.len()
}

/// Metadata of a walked entry, following symlinks.
///
/// A symlink whose target is gone yields the link's own metadata, so it is
/// treated as a special entry instead of failing the walk.
fn entry_metadata(path: &Path) -> Result<Metadata, SyncError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => match fs::symlink_metadata(path) {
            Ok(link) if link.file_type().is_symlink() => Ok(link),
            _ => Err(SyncError::io(path, e)),
        },
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// Copy a single file and stamp it with the source's modification time.
fn copy_file(source: &Path, dest: &Path, src_meta: &Metadata) -> Result<(), SyncError> {
    tracing::debug!(source = %source.display(), dest = %dest.display(), "copying file");

    fs::copy(source, dest).map_err(|e| SyncError::io(source, e))?;

    let mtime = FileTime::from_last_modification_time(src_meta);
    filetime::set_file_mtime(dest, mtime).map_err(|e| SyncError::io(dest, e))
}

/// Create a destination directory if it is missing.
fn ensure_dir(dir: &Path) -> Result<(), SyncError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| SyncError::cant_create(dir, e))
}
