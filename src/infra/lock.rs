//! Poisoned-lock recovery.
//!
//! A poisoned lock means another thread panicked while holding the
//! guard. The queue and the in-memory store keep their guarded state
//! consistent between operations, so recovery takes the inner value and
//! records the event instead of propagating the panic.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn note_recovery(owner: &'static str, op: &'static str, lock_kind: &'static str) {
    warn!(
        owner,
        op,
        lock_kind,
        "lock was poisoned by a panicked thread; continuing with its state"
    );
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        note_recovery(owner, op, "rwlock.read");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        note_recovery(owner, op, "rwlock.write");
        poisoned.into_inner()
    })
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    owner: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        note_recovery(owner, op, "mutex.lock");
        poisoned.into_inner()
    })
}
