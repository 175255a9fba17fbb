// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A virtual-time [`Backend`] for deterministic scheduler tests.
//!
//! Worker jobs are not run on real threads; they queue up and execute, one
//! at a time, when the test calls [`run_until_idle`]. The clock only moves
//! when a coordinator wait elapses (it "sleeps" by jumping the clock to its
//! deadline) or when the test calls [`advance`]. The result is that every
//! scheduling decision, and the exact time every task runs at, is
//! reproducible.
//!
//! [`advance`]: FakeClockBackend::advance
//! [`run_until_idle`]: FakeClockBackend::run_until_idle

use std::{collections::VecDeque,
          fmt,
          sync::{Mutex,
                 atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering}}};

use crate::scheduler::{Backend, Lockable, SchedulerGuard, SchedulerState, TaskRunner,
                       WaitOutcome, WorkerJob};

/// Virtual clock, deferred single-threaded worker pump, and injectable wait
/// interruption.
pub struct FakeClockBackend {
    now_nanos: AtomicI64,
    jobs: Mutex<VecDeque<WorkerJob>>,
    notify_count: AtomicUsize,
    decorate_count: AtomicUsize,
    interrupt_next_wait: AtomicBool,
}

impl FakeClockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now_nanos: AtomicI64::new(0),
            jobs: Mutex::new(VecDeque::new()),
            notify_count: AtomicUsize::new(0),
            decorate_count: AtomicUsize::new(0),
            interrupt_next_wait: AtomicBool::new(false),
        }
    }

    /// Current virtual time in nanoseconds.
    #[must_use]
    pub fn now(&self) -> i64 { self.now_nanos.load(Ordering::SeqCst) }

    /// Move the virtual clock forward.
    pub fn advance(&self, nanos: i64) { self.now_nanos.fetch_add(nanos, Ordering::SeqCst); }

    /// Make the next coordinator wait report [`WaitOutcome::Interrupted`].
    pub fn interrupt_next_wait(&self) {
        self.interrupt_next_wait.store(true, Ordering::SeqCst);
    }

    /// Worker jobs submitted but not yet run.
    #[must_use]
    pub fn pending_job_count(&self) -> usize { self.jobs.lock().unwrap().len() }

    /// Times the runner submitted a worker (every submission passes through
    /// [`Backend::decorate`]).
    #[must_use]
    pub fn spawned_worker_count(&self) -> usize {
        self.decorate_count.load(Ordering::SeqCst)
    }

    /// Times the coordinator was notified.
    #[must_use]
    pub fn notify_count(&self) -> usize { self.notify_count.load(Ordering::SeqCst) }

    /// Run queued worker jobs until none remain.
    ///
    /// Each job is a complete worker loop: it drains every task it can
    /// reach, advancing the virtual clock over coordinator waits. A
    /// recurrent task that never returns −1 would keep this from
    /// terminating; tests must make their recurrent tasks finite.
    pub fn run_until_idle(&self) {
        loop {
            let next_job = self.jobs.lock().unwrap().pop_front();
            match next_job {
                Some(job) => job(),
                None => return,
            }
        }
    }
}

impl Default for FakeClockBackend {
    fn default() -> Self { Self::new() }
}

impl Backend for FakeClockBackend {
    fn nano_time(&self) -> i64 { self.now() }

    fn coordinator_notify(&self, _waiter: &Lockable<SchedulerState>) {
        self.notify_count.fetch_add(1, Ordering::SeqCst);
    }

    fn coordinator_wait<'g>(
        &self,
        _waiter: &'g Lockable<SchedulerState>,
        guard: SchedulerGuard<'g>,
        wait_nanos: i64,
    ) -> (SchedulerGuard<'g>, WaitOutcome) {
        if self.interrupt_next_wait.swap(false, Ordering::SeqCst) {
            return (guard, WaitOutcome::Interrupted);
        }
        // Virtual sleep: jump straight to the deadline.
        self.advance(wait_nanos.max(0));
        (guard, WaitOutcome::Completed)
    }

    fn decorate(&self, job: WorkerJob) -> WorkerJob {
        self.decorate_count.fetch_add(1, Ordering::SeqCst);
        job
    }

    fn execute(
        &self,
        _runner: &TaskRunner,
        job: WorkerJob,
    ) -> Result<(), crate::error::SchedulerError> {
        self.jobs.lock().unwrap().push_back(job);
        Ok(())
    }
}

impl fmt::Debug for FakeClockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeClockBackend")
            .field("now_nanos", &self.now())
            .field("pending_jobs", &self.pending_job_count())
            .field("notify_count", &self.notify_count())
            .finish_non_exhaustive()
    }
}
