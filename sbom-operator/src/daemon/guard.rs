//! Single-flight guard for scheduled runs.

use std::sync::atomic::{AtomicBool, Ordering};

/// Marks a run as in flight for as long as it is held.
pub struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    /// Returns `None` when another run already holds the flag.
    pub fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) { self.running.store(false, Ordering::Release); }
}
