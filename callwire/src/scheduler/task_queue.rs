// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A set of tasks that are executed sequentially on a [`TaskRunner`]: one
//! logical stream of work. See [`TaskQueue`].
//!
//! [`TaskRunner`]: super::TaskRunner

use std::sync::{Arc, Weak};

use crate::error::SchedulerError;

use super::{DONT_RESCHEDULE, Task, TaskId, TaskRunner};

/// Identity of a queue inside its [`TaskRunner`]. Tasks hold this as their
/// back-reference: a non-owning index, validated on each use, that can never
/// form a reference-counted cycle with the runner.
///
/// [`TaskRunner`]: super::TaskRunner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(pub(crate) u64);

/// What the queue remembers about the task a worker is currently running.
/// The task value itself is on the worker's stack; this is enough to match
/// it on hand-back and to honor cancellation.
#[derive(Debug, Clone)]
pub(crate) struct ActiveTask {
    pub(crate) id: TaskId,
    pub(crate) cancelable: bool,
}

/// Per-queue scheduler state. Every field is guarded by the runner's single
/// lock; this type has no lock of its own.
#[derive(Debug)]
pub(crate) struct QueueState {
    pub(crate) name: String,
    pub(crate) active_task: Option<ActiveTask>,
    /// Pending tasks, ordered by [`Task::next_run_at`] ascending, ties broken
    /// by insertion order.
    pub(crate) future_tasks: Vec<Task>,
    /// True to not re-schedule the active task when it completes.
    pub(crate) cancel_active_task: bool,
    pub(crate) shutdown: bool,
    /// True once every [`TaskQueue`] handle has been dropped; the runner
    /// removes the state as soon as the queue is idle.
    pub(crate) orphaned: bool,
    pub(crate) tag: Weak<QueueTag>,
}

impl QueueState {
    pub(crate) fn new(name: String, tag: Weak<QueueTag>) -> Self {
        Self {
            name,
            active_task: None,
            future_tasks: Vec::new(),
            cancel_active_task: false,
            shutdown: false,
            orphaned: false,
            tag,
        }
    }

    /// Insert `task` to run after `delay_nanos`, keeping `future_tasks`
    /// ordered. Returns true if the task landed at the head of the queue, in
    /// which case the caller must kick the coordinator.
    pub(crate) fn schedule_and_decide(
        &mut self,
        now: i64,
        mut task: Task,
        delay_nanos: i64,
        recurrence: bool,
    ) -> bool {
        let execute_at = now + delay_nanos;
        task.next_run_at = execute_at;
        tracing::trace!(
            task = %task.name,
            queue = %self.name,
            delay_nanos,
            recurrence,
            "scheduled"
        );

        // Insert in chronological order, after any task with the same
        // eligibility time.
        let insert_at = self
            .future_tasks
            .iter()
            .position(|pending| pending.next_run_at > execute_at)
            .unwrap_or(self.future_tasks.len());
        self.future_tasks.insert(insert_at, task);

        insert_at == 0
    }

    /// Remove every cancelable pending task and request that a cancelable
    /// active task not be re-scheduled. Returns true if any pending task was
    /// removed.
    ///
    /// Removed tasks are pushed to `canceled_tasks` instead of being dropped
    /// here: task bodies may own [`TaskQueue`] handles, and those must only
    /// be dropped with the runner's lock released.
    pub(crate) fn cancel_all_and_decide(&mut self, canceled_tasks: &mut Vec<Task>) -> bool {
        if self
            .active_task
            .as_ref()
            .is_some_and(|active| active.cancelable)
        {
            self.cancel_active_task = true;
        }

        let mut removed_any = false;
        for index in (0..self.future_tasks.len()).rev() {
            if self.future_tasks[index].cancelable {
                let task = self.future_tasks.remove(index);
                tracing::trace!(task = %task.name, queue = %self.name, "canceled");
                canceled_tasks.push(task);
                removed_any = true;
            }
        }
        removed_any
    }
}

/// Shared identity of a [`TaskQueue`] handle. Dropping the last clone
/// releases the queue's state from the runner once the queue is idle.
#[derive(Debug)]
pub(crate) struct QueueTag {
    pub(crate) runner: TaskRunner,
    pub(crate) id: QueueId,
    pub(crate) name: String,
}

impl Drop for QueueTag {
    fn drop(&mut self) { self.runner.release_queue(self.id); }
}

/// A handle to one logical stream of work multiplexed onto a [`TaskRunner`].
///
/// Tasks scheduled on the same queue execute strictly sequentially, in
/// eligibility-then-insertion order; no two tasks of the same queue are ever
/// active simultaneously. Clones share the same queue.
///
/// [`TaskRunner`]: super::TaskRunner
#[derive(Clone, Debug)]
pub struct TaskQueue {
    tag: Arc<QueueTag>,
}

impl TaskQueue {
    pub(crate) fn from_tag(tag: Arc<QueueTag>) -> Self { Self { tag } }

    #[must_use]
    pub fn name(&self) -> &str { &self.tag.name }

    /// Schedule `task` for execution after `delay_nanos`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::QueueShutdown`] if this queue has been shut
    /// down and the task is not cancelable. A cancelable task scheduled onto
    /// a shut-down queue is silently dropped.
    pub fn schedule(&self, task: Task, delay_nanos: i64) -> Result<(), SchedulerError> {
        self.tag.runner.schedule_task(self.tag.id, task, delay_nanos)
    }

    /// Schedule a one-shot task built from `block`.
    ///
    /// # Errors
    ///
    /// Same as [`schedule`].
    ///
    /// [`schedule`]: Self::schedule
    pub fn execute(
        &self,
        name: impl Into<String>,
        delay_nanos: i64,
        cancelable: bool,
        block: impl FnOnce() + Send + 'static,
    ) -> Result<(), SchedulerError> {
        let mut block = Some(block);
        let task = Task::new(name, cancelable, move || {
            if let Some(block) = block.take() {
                block();
            }
            DONT_RESCHEDULE
        });
        self.schedule(task, delay_nanos)
    }

    /// Cancel every cancelable pending task, and prevent re-scheduling of
    /// the active task if it is cancelable. The active task still runs to
    /// completion.
    pub fn cancel_all(&self) { self.tag.runner.cancel_queue(self.tag.id, false); }

    /// Shut the queue down: cancel cancelable work and reject all further
    /// non-cancelable scheduling.
    pub fn shutdown(&self) { self.tag.runner.cancel_queue(self.tag.id, true); }
}
