//! Whole-tree progress on top of the engine's directory-scoped events.

use std::path::Path;

use jwalk::WalkDir;

use copit_core::{ProgressSink, ProgressState, SyncError};

/// Count every file and directory below `root`.
///
/// This is the number of progress events a complete walk of `root` emits,
/// which makes it usable as the denominator of an overall percentage.
pub fn count_entries(root: &Path) -> Result<usize, SyncError> {
    let mut count = 0;

    for entry in WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(true)
        .min_depth(1)
    {
        if let Err(e) = entry {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            // The engine reports a dangling symlink as a skipped entry.
            if !is_symlink(&path) {
                return Err(SyncError::io(path, e.into()));
            }
        }
        count += 1;
    }

    Ok(count)
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Sink adapter that also tracks progress across the whole tree.
///
/// Every scoped event is forwarded to the inner callback together with an
/// overall state whose total was computed before the walk started.
pub struct OverallProgress<F>
where
    F: FnMut(ProgressState, ProgressState),
{
    processed: usize,
    total: usize,
    callback: F,
}

impl<F> OverallProgress<F>
where
    F: FnMut(ProgressState, ProgressState),
{
    /// Create an adapter for walks that will visit `total` entries, of which
    /// `processed` were already visited by earlier folders.
    ///
    /// `callback` receives `(scope, overall)` for every event.
    pub fn resume(processed: usize, total: usize, callback: F) -> Self {
        Self {
            processed,
            total,
            callback,
        }
    }

    /// Overall progress so far.
    pub fn overall(&self) -> ProgressState {
        ProgressState::new(self.processed, self.total)
    }
}

impl<F> ProgressSink for OverallProgress<F>
where
    F: FnMut(ProgressState, ProgressState),
{
    fn on_progress(&mut self, processed: usize, total: usize) {
        self.processed += 1;
        // Entries created during the walk can push us past the pre-pass count.
        self.total = self.total.max(self.processed);
        let overall = self.overall();
        (self.callback)(ProgressState::new(processed, total), overall);
    }
}
