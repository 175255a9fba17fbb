// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A unit of work that can be executed, and possibly re-executed, on a
//! [`TaskQueue`]. See [`Task`].
//!
//! [`TaskQueue`]: super::TaskQueue

use std::{fmt,
          sync::atomic::{AtomicU64, Ordering}};

use super::QueueId;

/// Identity of a [`Task`], unique for the lifetime of the process.
///
/// Tasks are value-like: the scheduler moves them between a queue's pending
/// list and the running worker's stack. The id is what lets the scheduler
/// assert that the task a worker hands back is the task it handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A unit of work scheduled onto a [`TaskQueue`].
///
/// The body returns the delay in nanoseconds until the task should run again,
/// or [`DONT_RESCHEDULE`] (−1) to run only once. A task returning a
/// non-negative delay is *recurrent*: the queue re-inserts it after each run,
/// unless it was cancelled or the queue shut down in the meantime.
///
/// Cancelable tasks can be removed (or, when active, not re-scheduled) by
/// [`TaskQueue::cancel_all`]. Non-cancelable tasks always run to their own
/// completion.
///
/// [`TaskQueue`]: super::TaskQueue
/// [`TaskQueue::cancel_all`]: super::TaskQueue::cancel_all
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) cancelable: bool,
    /// Monotonic time at which this task becomes eligible, or −1 when the
    /// task is not scheduled.
    pub(crate) next_run_at: i64,
    /// The queue this task belongs to. Set on scheduling; a non-owning handle
    /// that is validated on each use.
    pub(crate) queue: Option<QueueId>,
    pub(crate) run: Box<dyn FnMut() -> i64 + Send>,
}

/// Return this from a task body to run once and not be re-scheduled.
pub const DONT_RESCHEDULE: i64 = -1;

impl Task {
    pub fn new(
        name: impl Into<String>,
        cancelable: bool,
        run: impl FnMut() -> i64 + Send + 'static,
    ) -> Self {
        Self {
            id: TaskId::next(),
            name: name.into(),
            cancelable,
            next_run_at: DONT_RESCHEDULE,
            queue: None,
            run: Box::new(run),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn is_cancelable(&self) -> bool { self.cancelable }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cancelable", &self.cancelable)
            .field("next_run_at", &self.next_run_at)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn task_ids_are_unique() {
        let one = Task::new("one", true, || DONT_RESCHEDULE);
        let two = Task::new("two", true, || DONT_RESCHEDULE);
        assert!(one.id != two.id);
    }

    #[test]
    fn new_task_is_unscheduled() {
        let task = Task::new("unscheduled", true, || DONT_RESCHEDULE);
        assert_eq!(task.next_run_at, DONT_RESCHEDULE);
        assert_eq!(task.queue, None);
        assert_eq!(task.name(), "unscheduled");
    }
}
