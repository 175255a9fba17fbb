// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A mutex paired with a condition variable, with "wait up to N nanoseconds"
//! semantics. This is the only lock the scheduler uses: every field of a
//! [`TaskRunner`] and of every queue it tracks is guarded by one instance of
//! this type, and the coordinator worker parks on its condition variable.
//!
//! [`TaskRunner`]: super::TaskRunner

use std::{sync::{Condvar, Mutex, MutexGuard, PoisonError},
          time::Duration};

/// A [`Mutex`] and the [`Condvar`] associated with it.
///
/// Lock acquisition recovers from poisoning: a task body that panics has
/// already re-raised on its own worker thread (with the scheduler bookkeeping
/// consistent), so a poisoned mutex must not wedge every other queue.
#[derive(Debug, Default)]
pub struct Lockable<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
}

impl<T> Lockable<T> {
    pub fn new(value: T) -> Self {
        Self {
            mutex: Mutex::new(value),
            condvar: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically release the lock and wait until [`notify`] is invoked or
    /// `wait_nanos` elapses, whichever comes first. Spurious wakeups are
    /// allowed; callers re-derive their decision after every return.
    ///
    /// [`notify`]: Self::notify
    pub fn wait_nanos<'a>(
        &self,
        guard: MutexGuard<'a, T>,
        wait_nanos: i64,
    ) -> MutexGuard<'a, T> {
        if wait_nanos <= 0 {
            return guard;
        }
        let timeout = Duration::from_nanos(wait_nanos.cast_unsigned());
        let (guard, _timed_out) = self
            .condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }

    /// Wake the waiter parked in [`wait_nanos`]. At most one thread (the
    /// coordinator) waits at a time.
    ///
    /// [`wait_nanos`]: Self::wait_nanos
    pub fn notify(&self) { self.condvar.notify_one(); }
}
