//! Cooperative task scheduler
//!
//! Async calls become [`AsyncTask`]s. The scheduler keeps them in a FIFO
//! ready queue and advances each by exactly one top-level statement per
//! turn, so tasks interleave round-robin on a single thread. Nested
//! constructs (loops, conditionals, blocks) resume mid-way through the
//! statement-position table each task carries.
//!
//! Awaiting is reentrant: a statement that awaits another task drives the
//! scheduler from inside the current step until that task finishes.

mod future;
mod queue;
mod step;
mod task;

pub use future::{Future, FUTURE_TYPE};
pub use queue::ReadyQueue;
pub use step::StepStatus;
pub use task::{AsyncTask, BindingSite, Receiver, TaskId, TaskIdGenerator, TaskState, TaskSummary};

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::backends::StatementExecutor;
use crate::frontend::ast::FunctionDecl;
use crate::runtime::errors::{RuntimeError, RuntimeResult};
use crate::runtime::scope::Scope;
use crate::runtime::value::Value;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause after a full sweep in which every queued task was blocked.
    pub idle_backoff_ms: u64,
    /// Log every step at debug level instead of trace.
    pub trace_steps: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: 1,
            trace_steps: false,
        }
    }
}

impl SchedulerConfig {
    #[inline]
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Scheduler statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Total tasks registered.
    pub tasks_registered: usize,
    /// Total tasks completed.
    pub tasks_completed: usize,
    /// Steps that executed a statement.
    pub steps_executed: usize,
    /// Steps that found their task blocked.
    pub steps_blocked: usize,
    /// Tasks completed by an expired timeout.
    pub timeouts: usize,
    /// Times the scheduler paused because nothing could run.
    pub idle_backoffs: usize,
}

/// Cooperative round-robin scheduler.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    tasks: IndexMap<TaskId, AsyncTask>,
    queue: ReadyQueue,
    ids: TaskIdGenerator,
    /// Tasks whose step is on the call stack, innermost last.
    active: SmallVec<[TaskId; 4]>,
    stats: SchedulerStats,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a new scheduler with default config.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: IndexMap::new(),
            queue: ReadyQueue::new(),
            ids: TaskIdGenerator::new(),
            active: SmallVec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// The clock used for every sleep and timeout computation.
    #[inline]
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Register a task and append it to the ready queue.
    ///
    /// Assigns the next ID and decides whether loops inside the body
    /// suspend after every iteration: that happens only when the body has
    /// no explicit `yield` anywhere.
    pub fn register_task(
        &mut self,
        mut task: AsyncTask,
    ) -> TaskId {
        let id = self.ids.next();
        task.id = id;
        task.auto_yield = task.body.as_ref().is_some_and(|body| !body.has_yield());
        debug!(task = %id, name = %task.name, auto_yield = task.auto_yield, "registered task");
        self.tasks.insert(id, task);
        self.queue.push(id);
        self.stats.tasks_registered += 1;
        id
    }

    /// Register a task running `body` with evaluated arguments.
    pub fn spawn(
        &mut self,
        body: std::sync::Arc<FunctionDecl>,
        args: Vec<Value>,
    ) -> TaskId {
        self.register_task(AsyncTask::new(body, args))
    }

    /// Register a bodyless timer task that finishes after `duration`.
    pub fn spawn_timer(
        &mut self,
        duration: Duration,
    ) -> TaskId {
        let id = self.register_task(AsyncTask::timer());
        self.sleep_task(id, duration);
        id
    }

    /// Put a task to sleep until `now + duration`.
    pub fn sleep_task(
        &mut self,
        id: TaskId,
        duration: Duration,
    ) {
        let wake_at = self.now() + duration;
        if let Some(task) = self.tasks.get_mut(&id) {
            task.wake_at = Some(wake_at);
            trace!(task = %id, ?duration, "sleeping");
        }
    }

    /// Arm a timeout: once `now + duration` has passed, the task's next
    /// step completes it with a Timeout error value.
    pub fn set_timeout(
        &mut self,
        id: TaskId,
        duration: Duration,
    ) {
        let deadline = self.now() + duration;
        if let Some(task) = self.tasks.get_mut(&id) {
            task.deadline = Some(deadline);
            trace!(task = %id, ?duration, "timeout armed");
        }
    }

    /// Mark `id` as waiting for `awaited` to finish.
    pub fn wait_on(
        &mut self,
        id: TaskId,
        awaited: TaskId,
    ) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.waiting_for = Some(awaited);
        }
    }

    /// Clear the waiting mark of `id`.
    pub fn clear_wait(
        &mut self,
        id: TaskId,
    ) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.waiting_for = None;
        }
    }

    /// Drive every task to completion.
    ///
    /// Pending tasks go to the back of the queue; finished tasks are
    /// finalized and dropped from it. A fault aborts the loop.
    pub fn run<E>(
        &mut self,
        exec: &mut E,
    ) -> RuntimeResult<()>
    where
        E: StatementExecutor + ?Sized,
    {
        debug!(queued = self.queue.len(), "scheduler run");
        let mut blocked_in_a_row = 0usize;
        while let Some(status) = self.cycle(exec)? {
            if status == StepStatus::Blocked {
                blocked_in_a_row += 1;
                if blocked_in_a_row >= self.queue.len() {
                    self.idle();
                    blocked_in_a_row = 0;
                }
            } else {
                blocked_in_a_row = 0;
            }
        }
        debug!("scheduler drained");
        Ok(())
    }

    /// Advance at most one task by one step.
    ///
    /// A dequeued task whose step is already on the call stack goes back
    /// untouched, so a nested cycle never re-enters a running task.
    pub fn run_one_cycle<E>(
        &mut self,
        exec: &mut E,
    ) -> RuntimeResult<()>
    where
        E: StatementExecutor + ?Sized,
    {
        self.cycle(exec).map(|_| ())
    }

    /// Run cycles until `id` has finished or the queue is empty.
    ///
    /// Returns quietly when the queue drains first; callers check the
    /// task's state themselves.
    pub fn run_until_complete<E>(
        &mut self,
        id: TaskId,
        exec: &mut E,
    ) -> RuntimeResult<()>
    where
        E: StatementExecutor + ?Sized,
    {
        let mut blocked_in_a_row = 0usize;
        while !self.is_task_finished(id) {
            match self.cycle(exec)? {
                None => break,
                Some(StepStatus::Blocked) => {
                    blocked_in_a_row += 1;
                    if blocked_in_a_row >= self.queue.len() {
                        self.idle();
                        blocked_in_a_row = 0;
                    }
                }
                Some(_) => blocked_in_a_row = 0,
            }
        }
        if self.is_task_finished(id) {
            self.finalize(id, exec);
        } else {
            warn!(task = %id, "ready queue drained before the task finished");
        }
        Ok(())
    }

    /// One dequeue-step-requeue turn. `None` when nothing can run: the
    /// queue is empty or holds only tasks whose step is on the stack.
    fn cycle<E>(
        &mut self,
        exec: &mut E,
    ) -> RuntimeResult<Option<StepStatus>>
    where
        E: StatementExecutor + ?Sized,
    {
        let Some(id) = self.queue.pop_front() else {
            return Ok(None);
        };
        if self.active.contains(&id) {
            self.queue.push(id);
            if self.queue.iter().all(|queued| self.active.contains(&queued)) {
                return Ok(None);
            }
            return Ok(Some(StepStatus::Blocked));
        }
        let status = self.execute_one_step(id, exec)?;
        match status {
            StepStatus::Done => self.finalize(id, exec),
            StepStatus::Pending | StepStatus::Blocked => self.queue.push(id),
        }
        Ok(Some(status))
    }

    fn idle(&mut self) {
        self.stats.idle_backoffs += 1;
        let backoff = self.config.idle_backoff();
        if !backoff.is_zero() {
            std::thread::sleep(backoff);
        }
    }

    /// Publish a finished task's results to the caller's scope.
    ///
    /// Rebinds the Future variable (if any) and writes the receiver back:
    /// merged into the caller's variable and into each flattened
    /// `var.member` entry that exists. Both land in the scope that held the
    /// variable when the task was started, live on the stack or saved in
    /// the owning task; a scope that is gone receives nothing. Runs once
    /// per task.
    pub fn finalize<E>(
        &mut self,
        id: TaskId,
        exec: &mut E,
    ) where
        E: StatementExecutor + ?Sized,
    {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if !task.is_executed || task.receiver_synced {
            return;
        }
        task.receiver_synced = true;
        self.stats.tasks_completed += 1;

        let future = task
            .future_binding
            .clone()
            .map(|site| (site, task.future.to_value(Some(id))));
        let members = task.receiver_members();
        let receiver = task.receiver.as_mut().map(|receiver| {
            if let Some(fields) = receiver.value.as_struct_mut() {
                for (member, value) in &members {
                    fields.set_field(member.clone(), value.clone());
                }
            }
            (receiver.site.clone(), receiver.value.clone())
        });

        if let Some((site, published)) = future {
            let bound = binding_scope(&mut self.tasks, exec, &site)
                .is_some_and(|scope| scope.assign_existing(&site.variable, published));
            if !bound {
                trace!(task = %id, binding = %site.variable, "future binding no longer in scope");
            }
        }
        if let Some((Some(site), value)) = receiver {
            if let Some(scope) = binding_scope(&mut self.tasks, exec, &site) {
                scope.assign_existing(&site.variable, value);
                for (member, value) in members {
                    scope.assign_existing(&format!("{}.{}", site.variable, member), value);
                }
            } else {
                trace!(task = %id, receiver = %site.variable, "receiver scope is gone");
            }
        }
        debug!(task = %id, "finalized");
    }

    /// Whether `id` names a finished task.
    #[inline]
    pub fn is_task_finished(
        &self,
        id: TaskId,
    ) -> bool {
        self.tasks.get(&id).is_some_and(|t| t.is_executed)
    }

    /// Look up a task.
    #[inline]
    pub fn get_task(
        &self,
        id: TaskId,
    ) -> Option<&AsyncTask> {
        self.tasks.get(&id)
    }

    /// Completion slot of a task as a program-visible value.
    pub fn future_value(
        &self,
        id: TaskId,
    ) -> RuntimeResult<Value> {
        self.tasks
            .get(&id)
            .map(|t| t.future.to_value(Some(id)))
            .ok_or(RuntimeError::UnknownTask(id))
    }

    /// Bind a task's completion slot to a caller variable.
    pub fn bind_future(
        &mut self,
        id: TaskId,
        site: BindingSite,
    ) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.future_binding = Some(site);
        }
    }

    /// Set the caller variable that receives a method task's receiver.
    pub fn bind_receiver(
        &mut self,
        id: TaskId,
        site: BindingSite,
    ) {
        if let Some(receiver) = self.tasks.get_mut(&id).and_then(|t| t.receiver.as_mut()) {
            receiver.site = Some(site);
        }
    }

    /// Whether the ready queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether any task is queued.
    #[inline]
    pub fn has_tasks(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Number of tasks ever registered.
    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of queued tasks.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether `id` is in the ready queue.
    #[inline]
    pub fn is_queued(
        &self,
        id: TaskId,
    ) -> bool {
        self.queue.contains(id)
    }

    /// Queued task IDs, next to run first.
    pub fn queued(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.queue.iter()
    }

    /// Task whose step is innermost on the call stack.
    #[inline]
    pub fn active_task(&self) -> Option<TaskId> {
        self.active.last().copied()
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// All tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &AsyncTask> {
        self.tasks.values()
    }

    /// Serializable summaries of all tasks.
    pub fn summaries(&self) -> Vec<TaskSummary> {
        self.tasks.values().map(AsyncTask::summary).collect()
    }
}

/// The scope a binding site points at: the live frame while it is on the
/// stack, otherwise the owning task's saved scope.
fn binding_scope<'a, E>(
    tasks: &'a mut IndexMap<TaskId, AsyncTask>,
    exec: &'a mut E,
    site: &BindingSite,
) -> Option<&'a mut Scope>
where
    E: StatementExecutor + ?Sized,
{
    if let Some(scope) = exec.frame_mut(site.frame) {
        return Some(scope);
    }
    let owner = tasks.get_mut(&site.owner?)?;
    owner.scope.as_mut().filter(|scope| scope.id() == Some(site.frame))
}

#[cfg(test)]
mod tests;
