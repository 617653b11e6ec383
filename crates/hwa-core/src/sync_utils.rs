use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, taking the guard back from a panicked holder.
pub fn lock_unpoisoned<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
