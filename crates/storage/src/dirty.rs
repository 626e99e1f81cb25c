//! Dirty flag shared between a datastore and its collections
//!
//! The flag doubles as the datastore's flush lock: `flush` holds the guard for
//! the whole snapshot-and-write sequence, so a collection that tries to mark
//! the store dirty during a flush blocks until the flush has finished and then
//! sets the flag again.
//!
//! Collections always release their own lock before calling [`DirtyFlag::mark`].
//! The two locks are never held at the same time by a mutator, which keeps the
//! ordering with `flush` (flag lock, then collection read locks) deadlock-free.

use parking_lot::{Mutex, MutexGuard};

/// Tracks unflushed mutations.
#[derive(Debug, Default)]
pub struct DirtyFlag {
    dirty: Mutex<bool>,
}

impl DirtyFlag {
    /// Create a clean flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a mutation has been applied
    pub fn mark(&self) {
        *self.dirty.lock() = true;
    }

    /// Check if unflushed mutations exist
    pub fn is_dirty(&self) -> bool {
        *self.dirty.lock()
    }

    /// Acquire the flag for the duration of a flush
    pub fn lock(&self) -> MutexGuard<'_, bool> {
        self.dirty.lock()
    }
}
