//! Internal helpers.

use std::sync::{LockResult, Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// The protected state of ports and sources stays consistent at every step
/// boundary, so a panic in a user callback does not invalidate it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    recover(mutex.lock())
}

/// Extracts the guard of a lock or condition variable wait, recovering it if
/// a previous holder panicked.
pub(crate) fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
