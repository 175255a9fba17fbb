// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The seam between a [`TaskRunner`] and the host system: a monotonic clock,
//! the coordinator's timed wait, and worker-thread creation. Production code
//! uses [`ThreadBackend`]; tests inject a virtual-time backend (see
//! [`crate::test_fixtures::FakeClockBackend`]) so every scheduling decision
//! is deterministic.
//!
//! [`TaskRunner`]: super::TaskRunner

use std::{fmt, io,
          thread,
          time::Instant};

use crate::error::SchedulerError;

use super::{Lockable, SchedulerGuard, SchedulerState, TaskRunner};

/// A worker's entry point, handed to [`Backend::execute`].
pub type WorkerJob = Box<dyn FnOnce() + Send + 'static>;

/// How a coordinator wait ended.
///
/// [`Interrupted`] is the "this thread was asked to stop waiting and abandon
/// its pending work" signal; the runner responds by cancelling every
/// cancelable task. The thread-based backend never produces it.
///
/// [`Interrupted`]: WaitOutcome::Interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The wait timed out or was notified; re-derive the next decision.
    Completed,
    /// The wait was interrupted; cancel all pending work, then re-derive.
    Interrupted,
}

/// Host services consumed by [`TaskRunner`].
///
/// All methods are called with the runner's lock held unless noted; none of
/// them may block, except [`coordinator_wait`] which is *the* blocking point
/// of the scheduler and atomically releases the lock while parked.
///
/// [`TaskRunner`]: super::TaskRunner
/// [`coordinator_wait`]: Self::coordinator_wait
pub trait Backend: Send + Sync + fmt::Debug {
    /// Monotonic nanoseconds. The zero point is arbitrary but fixed for the
    /// lifetime of the backend.
    fn nano_time(&self) -> i64;

    /// Wake the coordinator parked in [`coordinator_wait`].
    ///
    /// [`coordinator_wait`]: Self::coordinator_wait
    fn coordinator_notify(&self, waiter: &Lockable<SchedulerState>);

    /// Park the calling worker until notified or until `wait_nanos` elapses,
    /// releasing `guard` for the duration and reacquiring it before
    /// returning.
    fn coordinator_wait<'g>(
        &self,
        waiter: &'g Lockable<SchedulerState>,
        guard: SchedulerGuard<'g>,
        wait_nanos: i64,
    ) -> (SchedulerGuard<'g>, WaitOutcome);

    /// Passthrough hook applied to every worker job before [`execute`].
    /// Production backends return the job unchanged; test backends wrap it to
    /// observe worker lifecycles.
    ///
    /// [`execute`]: Self::execute
    fn decorate(&self, job: WorkerJob) -> WorkerJob { job }

    /// Submit a worker job. Must not block the caller (the runner invokes
    /// this while holding its lock).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ThreadSpawn`] if the host cannot start a
    /// worker; the runner rolls back its thread-start accounting in response.
    fn execute(&self, runner: &TaskRunner, job: WorkerJob) -> Result<(), SchedulerError>;
}

/// The production backend: real time, real condition-variable waits, and one
/// named OS thread per requested worker.
///
/// The runner's own thread-start accounting (`execute_call_count` vs
/// `run_call_count`) already bounds how often this is asked for a thread, and
/// idle workers exit promptly, so there is no pool here.
pub struct ThreadBackend {
    origin: Instant,
}

/// Name given to every worker thread this backend spawns.
const WORKER_THREAD_NAME: &str = "callwire TaskRunner";

impl ThreadBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for ThreadBackend {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for ThreadBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadBackend")
            .field("origin", &self.origin)
            .finish()
    }
}

impl Backend for ThreadBackend {
    fn nano_time(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    fn coordinator_notify(&self, waiter: &Lockable<SchedulerState>) { waiter.notify(); }

    fn coordinator_wait<'g>(
        &self,
        waiter: &'g Lockable<SchedulerState>,
        guard: SchedulerGuard<'g>,
        wait_nanos: i64,
    ) -> (SchedulerGuard<'g>, WaitOutcome) {
        (waiter.wait_nanos(guard, wait_nanos), WaitOutcome::Completed)
    }

    fn execute(&self, _runner: &TaskRunner, job: WorkerJob) -> Result<(), SchedulerError> {
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(job)
            .map(drop)
            .map_err(map_spawn_error)
    }
}

fn map_spawn_error(err: io::Error) -> SchedulerError { SchedulerError::ThreadSpawn(err) }

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::mpsc, time::Duration};

    #[test]
    fn nano_time_is_monotonic() {
        let backend = ThreadBackend::new();
        let first = backend.nano_time();
        let second = backend.nano_time();
        assert!(second >= first);
    }

    #[test]
    fn execute_runs_the_job_on_another_thread() {
        let backend = ThreadBackend::new();
        let runner = TaskRunner::new(std::sync::Arc::new(ThreadBackend::new()));
        let (sender, receiver) = mpsc::channel();

        backend
            .execute(
                &runner,
                Box::new(move || {
                    sender.send(thread::current().name().map(String::from)).unwrap();
                }),
            )
            .unwrap();

        let worker_name = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(worker_name.as_deref(), Some(WORKER_THREAD_NAME));
    }

    #[test]
    fn decorate_is_identity_by_default() {
        let backend = ThreadBackend::new();
        let job: WorkerJob = Box::new(|| {});
        // A decorated job must still be runnable.
        backend.decorate(job)();
    }
}
