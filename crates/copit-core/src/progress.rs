//! Progress reporting types for backups.

use serde::{Deserialize, Serialize};

/// Progress within one progress scope.
///
/// `total` is the number of direct children of the directory being walked,
/// so a deep tree produces one burst per directory, each starting again at
/// `processed == 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Entries visited so far in this scope.
    pub processed: usize,
    /// Entries in this scope.
    pub total: usize,
}

impl ProgressState {
    /// Create a new progress state.
    pub fn new(processed: usize, total: usize) -> Self {
        Self { processed, total }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.processed as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Check whether every entry in the scope has been visited.
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

impl std::fmt::Display for ProgressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.processed, self.total)
    }
}

/// Receiver of progress events emitted by the sync engine.
///
/// Called once per visited entry, from the thread running the walk.
pub trait ProgressSink {
    /// Report that `processed` of `total` entries in the current scope are done.
    fn on_progress(&mut self, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize),
{
    fn on_progress(&mut self, processed: usize, total: usize) {
        self(processed, total)
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _processed: usize, _total: usize) {}
}

/// How a backup job reports progress to its caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Directory-scoped bursts only.
    #[default]
    Directory,
    /// Directory-scoped bursts plus a whole-tree total computed up front.
    Overall,
}
