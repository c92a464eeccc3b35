//! Shared "a backup is running" flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owned by the host; at most one ticket exists at a time.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    /// Create a new guard with no backup running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a ticket is currently held.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the guard, or `None` if a backup is already running.
    pub fn try_acquire(&self) -> Option<RunTicket> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunTicket {
                running: Arc::clone(&self.running),
            })
    }
}

/// Proof that the holder owns the run guard. Released on drop.
#[derive(Debug)]
pub struct RunTicket {
    running: Arc<AtomicBool>,
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
