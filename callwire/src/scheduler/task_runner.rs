// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A set of worker threads that execute tasks from many [`TaskQueue`]s,
//! coordinated through a single lock. See [`TaskRunner`].

use std::{collections::BTreeMap,
          panic,
          sync::{Arc, LazyLock, MutexGuard}};

use crate::error::SchedulerError;

use super::{Backend, DONT_RESCHEDULE, Lockable, QueueId, QueueState, QueueTag, Task,
            TaskQueue, ThreadBackend, WaitOutcome, WorkerJob, task_queue::ActiveTask};

/// Guard over the scheduler's single lock.
pub type SchedulerGuard<'a> = MutexGuard<'a, SchedulerState>;

/// Everything a [`TaskRunner`] knows, guarded by one [`Lockable`]. Workers
/// make every decision under this lock and run task bodies with it released.
#[derive(Debug)]
pub struct SchedulerState {
    pub(crate) next_queue_id: u64,
    pub(crate) queues: BTreeMap<QueueId, QueueState>,
    /// Queues with a task currently executing.
    pub(crate) busy_queues: Vec<QueueId>,
    /// Queues with pending tasks and no active task, whether or not the head
    /// task is currently eligible.
    pub(crate) ready_queues: Vec<QueueId>,
    /// Incremented when a worker is submitted to the backend.
    pub(crate) execute_call_count: u64,
    /// Incremented when a submitted worker enters its run loop. Always ≤
    /// `execute_call_count`; the difference is the number of workers in
    /// transit.
    pub(crate) run_call_count: u64,
    /// True while one worker holds the timed coordinator wait.
    pub(crate) coordinator_waiting: bool,
    /// Monotonic deadline of the coordinator's wait, valid while
    /// `coordinator_waiting` is set.
    pub(crate) coordinator_wake_up_at: i64,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            next_queue_id: 10_000,
            queues: BTreeMap::new(),
            busy_queues: Vec::new(),
            ready_queues: Vec::new(),
            execute_call_count: 0,
            run_call_count: 0,
            coordinator_waiting: false,
            coordinator_wake_up_at: 0,
        }
    }

    fn queue_mut(&mut self, queue_id: QueueId) -> &mut QueueState {
        self.queues
            .get_mut(&queue_id)
            .expect("queue state for a live handle")
    }

    /// Take the head task of `queue_id` and mark the queue busy.
    fn before_run(&mut self, queue_id: QueueId) -> Task {
        let queue = self.queue_mut(queue_id);
        let mut task = queue.future_tasks.remove(0);
        task.next_run_at = DONT_RESCHEDULE;
        queue.active_task = Some(ActiveTask {
            id: task.id,
            cancelable: task.cancelable,
        });
        self.ready_queues.retain(|id| *id != queue_id);
        self.busy_queues.push(queue_id);
        task
    }

    /// Remove the queue's state once no handle, no active task, and no
    /// pending task keeps it alive.
    fn reap_if_orphaned(&mut self, queue_id: QueueId) {
        let removable = self.queues.get(&queue_id).is_some_and(|queue| {
            queue.orphaned && queue.active_task.is_none() && queue.future_tasks.is_empty()
        });
        if removable {
            self.queues.remove(&queue_id);
        }
    }
}

#[derive(Debug)]
struct RunnerCore {
    backend: Arc<dyn Backend>,
    state: Lockable<SchedulerState>,
}

/// A scheduler that multiplexes [`TaskQueue`]s over on-demand worker
/// threads.
///
/// Workers are started through the [`Backend`] only when there is work no
/// current worker will reach: the `execute_call_count` / `run_call_count`
/// pair ensures at most one worker is ever in transit, so N ready tasks
/// never start N+k threads. At most one worker at a time is *the
/// coordinator*, parked in a timed wait until the earliest eligibility time;
/// every other worker is either running a task or exiting.
///
/// Handles are cheap clones sharing one scheduler.
#[derive(Clone, Debug)]
pub struct TaskRunner {
    core: Arc<RunnerCore>,
}

impl TaskRunner {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            core: Arc::new(RunnerCore {
                backend,
                state: Lockable::new(SchedulerState::new()),
            }),
        }
    }

    /// The process-wide runner, lazily initialized over [`ThreadBackend`].
    /// Embedders that need their own lifecycle (or a virtual clock) construct
    /// runners explicitly with [`new`].
    ///
    /// [`new`]: Self::new
    #[must_use]
    pub fn global() -> &'static TaskRunner {
        static GLOBAL: LazyLock<TaskRunner> =
            LazyLock::new(|| TaskRunner::new(Arc::new(ThreadBackend::new())));
        &GLOBAL
    }

    /// Create a fresh queue. Queue names are runner-assigned and stable.
    #[must_use]
    pub fn new_queue(&self) -> TaskQueue {
        let mut state = self.core.state.lock();
        let id = QueueId(state.next_queue_id);
        state.next_queue_id += 1;
        let name = format!("Q{}", id.0);
        let tag = Arc::new(QueueTag {
            runner: self.clone(),
            id,
            name: name.clone(),
        });
        state
            .queues
            .insert(id, QueueState::new(name, Arc::downgrade(&tag)));
        TaskQueue::from_tag(tag)
    }

    /// Snapshot of the queues this runner currently tracks work for.
    #[must_use]
    pub fn active_queues(&self) -> Vec<TaskQueue> {
        let state = self.core.state.lock();
        state
            .busy_queues
            .iter()
            .chain(state.ready_queues.iter())
            .filter_map(|queue_id| state.queues.get(queue_id))
            .filter_map(|queue| queue.tag.upgrade())
            .map(TaskQueue::from_tag)
            .collect()
    }

    /// Issue cancellation to every tracked queue.
    pub fn cancel_all(&self) {
        // Declared before the guard so canceled task bodies drop after the
        // lock is released; bodies may own queue handles.
        let mut canceled_tasks = Vec::new();
        let mut state = self.core.state.lock();
        self.cancel_all_locked(&mut state, &mut canceled_tasks);
    }

    pub(crate) fn schedule_task(
        &self,
        queue_id: QueueId,
        mut task: Task,
        delay_nanos: i64,
    ) -> Result<(), SchedulerError> {
        let mut state = self.core.state.lock();
        let now = self.core.backend.nano_time();

        let head_changed = {
            let queue = state.queue_mut(queue_id);
            if queue.shutdown {
                if task.cancelable {
                    tracing::trace!(
                        task = %task.name,
                        queue = %queue.name,
                        "schedule dropped (queue shut down)"
                    );
                    return Ok(());
                }
                return Err(SchedulerError::QueueShutdown {
                    queue: queue.name.clone(),
                });
            }
            task.queue = Some(queue_id);
            queue.schedule_and_decide(now, task, delay_nanos, false)
        };

        if head_changed {
            self.kick_coordinator(&mut state, queue_id);
        }
        Ok(())
    }

    pub(crate) fn cancel_queue(&self, queue_id: QueueId, also_shutdown: bool) {
        // Declared before the guard so canceled task bodies drop off-lock.
        let mut canceled_tasks = Vec::new();
        let mut state = self.core.state.lock();
        let changed = {
            let queue = state.queue_mut(queue_id);
            if also_shutdown {
                queue.shutdown = true;
            }
            queue.cancel_all_and_decide(&mut canceled_tasks)
        };
        if changed {
            self.kick_coordinator(&mut state, queue_id);
        }
    }

    pub(crate) fn release_queue(&self, queue_id: QueueId) {
        let mut state = self.core.state.lock();
        if let Some(queue) = state.queues.get_mut(&queue_id) {
            queue.orphaned = true;
        }
        state.reap_if_orphaned(queue_id);
    }

    /// Reconcile `ready_queues` membership for `queue_id`, then make sure
    /// somebody will act on the change: wake the coordinator if one is
    /// parked, otherwise start a worker.
    fn kick_coordinator(&self, state: &mut SchedulerState, queue_id: QueueId) {
        let (has_active_task, has_pending_tasks) = {
            let queue = state.queue_mut(queue_id);
            (queue.active_task.is_some(), !queue.future_tasks.is_empty())
        };
        if !has_active_task {
            if has_pending_tasks {
                if !state.ready_queues.contains(&queue_id) {
                    state.ready_queues.push(queue_id);
                }
            } else {
                state.ready_queues.retain(|id| *id != queue_id);
            }
        }

        if state.coordinator_waiting {
            self.core.backend.coordinator_notify(&self.core.state);
        } else {
            self.start_another_thread(state);
        }
    }

    /// Submit one worker to the backend, unless a previously submitted
    /// worker has not yet entered its run loop.
    fn start_another_thread(&self, state: &mut SchedulerState) {
        if state.execute_call_count > state.run_call_count {
            return; // A thread is still in transit and will see this work.
        }
        state.execute_call_count += 1;

        let worker = self.clone();
        let job: WorkerJob = Box::new(move || worker.run_worker());
        let job = self.core.backend.decorate(job);

        tracing::debug!("starting a task runner worker");
        if let Err(err) = self.core.backend.execute(self, job) {
            state.execute_call_count -= 1;
            tracing::error!(%err, "failed to start a task runner worker");
        }
    }

    fn cancel_all_locked(&self, state: &mut SchedulerState, canceled_tasks: &mut Vec<Task>) {
        for index in (0..state.busy_queues.len()).rev() {
            let queue_id = state.busy_queues[index];
            state.queue_mut(queue_id).cancel_all_and_decide(canceled_tasks);
        }
        for index in (0..state.ready_queues.len()).rev() {
            let queue_id = state.ready_queues[index];
            state.queue_mut(queue_id).cancel_all_and_decide(canceled_tasks);
            if state.queue_mut(queue_id).future_tasks.is_empty() {
                state.ready_queues.remove(index);
                state.reap_if_orphaned(queue_id);
            }
        }
    }

    /// The worker loop. Runs on a backend-provided thread until there is no
    /// task this worker should run.
    fn run_worker(&self) {
        let core = &self.core;
        let mut guard = core.state.lock();
        guard.run_call_count += 1;

        loop {
            let (reacquired, next) = self.await_task_to_run(guard);
            guard = reacquired;
            let Some(mut task) = next else {
                drop(guard);
                return;
            };

            tracing::trace!(task = %task.name, "starting");
            drop(guard);

            let started_at = core.backend.nano_time();
            let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| (task.run)()));
            let elapsed_nanos = core.backend.nano_time() - started_at;

            guard = core.state.lock();
            match outcome {
                Ok(delay_nanos) => {
                    tracing::trace!(task = %task.name, elapsed_nanos, "finished");
                    let retired = self.after_run(&mut guard, task, delay_nanos, true);
                    if retired.is_some() {
                        // Retired task bodies may own queue handles; drop
                        // them with the lock released.
                        drop(guard);
                        drop(retired);
                        guard = core.state.lock();
                    }
                }
                Err(panic_payload) => {
                    tracing::error!(
                        task = %task.name,
                        elapsed_nanos,
                        "task failed; re-raising on this worker"
                    );
                    let retired = self.after_run(&mut guard, task, DONT_RESCHEDULE, false);
                    drop(guard);
                    drop(retired);
                    panic::resume_unwind(panic_payload);
                }
            }
        }
    }

    /// Decide what this worker does next. Returns the task to run, or `None`
    /// to let the worker exit. May park the calling worker as the
    /// coordinator while every pending task is still in the future.
    fn await_task_to_run<'g>(
        &'g self,
        mut guard: SchedulerGuard<'g>,
    ) -> (SchedulerGuard<'g>, Option<Task>) {
        loop {
            if guard.ready_queues.is_empty() {
                return (guard, None);
            }

            let now = self.core.backend.nano_time();
            let mut min_delay_nanos = i64::MAX;
            let mut ready_queue: Option<QueueId> = None;
            let mut multiple_ready_tasks = false;

            for &queue_id in &guard.ready_queues {
                let queue = guard.queues.get(&queue_id).expect("ready queue is tracked");
                let head = queue
                    .future_tasks
                    .first()
                    .expect("ready queue has a pending task");
                let candidate_delay = head.next_run_at - now;
                if candidate_delay > 0 {
                    min_delay_nanos = min_delay_nanos.min(candidate_delay);
                } else if ready_queue.is_some() {
                    multiple_ready_tasks = true;
                    break;
                } else {
                    ready_queue = Some(queue_id);
                }
            }

            if let Some(queue_id) = ready_queue {
                let task = guard.before_run(queue_id);
                // Also start another worker if there's more work to do.
                if multiple_ready_tasks
                    || (!guard.coordinator_waiting && !guard.ready_queues.is_empty())
                {
                    self.start_another_thread(&mut guard);
                }
                return (guard, Some(task));
            }

            if guard.coordinator_waiting {
                // Wake the coordinator only when a strictly earlier deadline
                // has appeared.
                if min_delay_nanos < guard.coordinator_wake_up_at - now {
                    self.core.backend.coordinator_notify(&self.core.state);
                }
                return (guard, None);
            }

            guard.coordinator_waiting = true;
            guard.coordinator_wake_up_at = now + min_delay_nanos;
            let (reacquired, outcome) =
                self.core
                    .backend
                    .coordinator_wait(&self.core.state, guard, min_delay_nanos);
            guard = reacquired;
            guard.coordinator_waiting = false;
            if outcome == WaitOutcome::Interrupted {
                let mut canceled_tasks = Vec::new();
                self.cancel_all_locked(&mut guard, &mut canceled_tasks);
                if !canceled_tasks.is_empty() {
                    // Canceled task bodies may own queue handles; drop them
                    // with the lock released, then re-derive the decision.
                    drop(guard);
                    drop(canceled_tasks);
                    guard = self.core.state.lock();
                }
            }
        }
    }

    /// Hand a task back after its body ran. Re-schedules recurrent tasks and
    /// reconciles queue list membership. Returns the task when it was not
    /// re-scheduled; the caller must drop it with the lock released.
    fn after_run(
        &self,
        state: &mut SchedulerState,
        task: Task,
        delay_nanos: i64,
        completed_normally: bool,
    ) -> Option<Task> {
        let queue_id = task.queue.expect("finished task has a queue");
        let now = self.core.backend.nano_time();
        let task_id = task.id;

        let (retired, has_pending_tasks) = {
            let queue = state.queue_mut(queue_id);
            assert!(
                queue
                    .active_task
                    .as_ref()
                    .is_some_and(|active| active.id == task_id),
                "queue {} is not running the task being retired",
                queue.name
            );
            let cancel_active_task = queue.cancel_active_task;
            queue.cancel_active_task = false;
            queue.active_task = None;

            let retired =
                if delay_nanos != DONT_RESCHEDULE && !cancel_active_task && !queue.shutdown {
                    queue.schedule_and_decide(now, task, delay_nanos, true);
                    None
                } else {
                    Some(task)
                };
            (retired, !queue.future_tasks.is_empty())
        };

        state.busy_queues.retain(|id| *id != queue_id);
        if has_pending_tasks {
            state.ready_queues.push(queue_id);
            // The worker that just crashed is about to exit; replace it.
            if !completed_normally {
                self.start_another_thread(state);
            }
        } else {
            state.reap_if_orphaned(queue_id);
        }
        retired
    }
}
