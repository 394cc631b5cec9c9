//! Write-once failure slot shared by concurrent tasks.
//!
//! The first error recorded wins; later writes are dropped. Tasks consult
//! the slot before starting new work, which gives cooperative cancellation
//! without aborting work already in flight.

use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct FirstFailure<E> {
    slot: Mutex<Option<E>>,
}

impl<E> Default for FirstFailure<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FirstFailure<E> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    // A panic while holding the lock cannot leave the Option half-written
    fn lock(&self) -> MutexGuard<'_, Option<E>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a failure has been recorded
    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Record `err` if the slot is empty.
    ///
    /// Returns `true` when this call won the slot.
    pub fn record(&self, err: E) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(err);
        true
    }

    /// Remove the recorded failure, leaving the slot empty
    pub fn take(&self) -> Option<E> {
        self.lock().take()
    }
}
