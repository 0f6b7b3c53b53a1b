//! Panic containment for user-supplied update logic.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::UpdateLogicError;

/// Run `f`, converting a panic into [`UpdateLogicError::Panicked`].
///
/// Update logic is late-bound and untrusted; a panic inside one unit's
/// rule must not take down the worker thread that happened to run it.
/// State touched by `f` may be half-updated when a panic is caught, so
/// callers only use this where the touched state is a pending buffer
/// that is discarded or overwritten on failure.
pub fn catch_panic<T>(
    origin: &str,
    f: impl FnOnce() -> Result<T, UpdateLogicError>,
) -> Result<T, UpdateLogicError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(UpdateLogicError::Panicked {
            origin: origin.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Update logic runs under [`catch_panic`], so a poisoned lock only ever
/// guards a pending buffer or scheduler bookkeeping that stays consistent
/// across the contained panic.
pub fn lock_recover<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
