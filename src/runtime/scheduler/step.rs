//! Single-step execution of a task

use std::sync::Arc;

use tracing::{debug, trace};

use super::task::TaskId;
use super::Scheduler;
use crate::backends::StatementExecutor;
use crate::frontend::ast::FunctionDecl;
use crate::runtime::errors::RuntimeResult;
use crate::runtime::scope::{Scope, StatementPositions};
use crate::runtime::signal::Signal;
use crate::runtime::value::Value;

/// Outcome of one scheduling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// A statement ran and the task has more to do.
    Pending,
    /// The task could not run: waiting, sleeping or already on the stack.
    Blocked,
    /// The task finished.
    Done,
}

impl StepStatus {
    /// Whether the task still needs more steps.
    #[inline]
    pub fn is_pending(self) -> bool {
        !matches!(self, StepStatus::Done)
    }
}

/// Installs a task's execution context on the executor for one step.
///
/// Dropping the guard puts back the scope depth, the current task, the
/// auto-suspend mode and the statement-position table that were in place
/// before the step, whichever way the step ends.
struct StepGuard<'a, E: StatementExecutor + ?Sized> {
    exec: &'a mut E,
    base_depth: usize,
    prev_task: Option<TaskId>,
    prev_auto_yield: bool,
    prev_positions: Option<StatementPositions>,
}

impl<'a, E: StatementExecutor + ?Sized> StepGuard<'a, E> {
    fn enter(
        exec: &'a mut E,
        id: TaskId,
        auto_yield: bool,
        scope: Scope,
        positions: StatementPositions,
    ) -> Self {
        let prev_task = exec.current_task_id();
        let prev_auto_yield = exec.auto_yield_mode();
        let base_depth = exec.scope_depth();
        exec.set_current_task_id(Some(id));
        exec.set_auto_yield_mode(auto_yield);
        exec.push_scope(scope);
        let prev_positions = Some(exec.replace_statement_positions(positions));
        Self {
            exec,
            base_depth,
            prev_task,
            prev_auto_yield,
            prev_positions,
        }
    }

    #[inline]
    fn executor(&mut self) -> &mut E {
        &mut *self.exec
    }

    /// Snapshot the task scope, restore the executor and hand back the
    /// task's scope and positions.
    fn finish(mut self) -> (Scope, StatementPositions) {
        let scope = self.exec.scope_at(self.base_depth).cloned().unwrap_or_default();
        let positions = self.restore();
        (scope, positions)
    }

    fn restore(&mut self) -> StatementPositions {
        let Some(prev_positions) = self.prev_positions.take() else {
            return StatementPositions::new();
        };
        self.exec.truncate_scopes(self.base_depth);
        let positions = self.exec.replace_statement_positions(prev_positions);
        self.exec.set_auto_yield_mode(self.prev_auto_yield);
        self.exec.set_current_task_id(self.prev_task);
        positions
    }
}

impl<E: StatementExecutor + ?Sized> Drop for StepGuard<'_, E> {
    fn drop(&mut self) {
        self.restore();
    }
}

impl Scheduler {
    /// Advance task `id` by at most one top-level statement.
    ///
    /// Order of checks: finished, waiting, sleeping, timed out, then normal
    /// execution. Faults raised by the statement are returned unchanged
    /// after the executor's state has been restored.
    ///
    /// Stepping a task directly leaves it in the ready queue. A nested
    /// cycle started by that step finds the task already on the stack and
    /// skips it; when nothing else is queued the nested cycle treats the
    /// queue as drained, so an `await` inside such a step stalls instead
    /// of waiting for the task itself.
    pub fn execute_one_step<E>(
        &mut self,
        id: TaskId,
        exec: &mut E,
    ) -> RuntimeResult<StepStatus>
    where
        E: StatementExecutor + ?Sized,
    {
        let Some(task) = self.tasks.get(&id) else {
            return Ok(StepStatus::Done);
        };
        if task.is_executed {
            return Ok(StepStatus::Done);
        }

        if let Some(awaited) = task.waiting_for {
            if !self.is_task_finished(awaited) {
                self.stats.steps_blocked += 1;
                trace!(task = %id, awaiting = %awaited, "still waiting");
                return Ok(StepStatus::Blocked);
            }
            self.clear_wait(id);
        }

        let now = self.now();
        let Some(task) = self.tasks.get_mut(&id) else {
            return Ok(StepStatus::Done);
        };
        let timed_out = task.deadline.is_some_and(|deadline| now >= deadline);

        if let Some(wake_at) = task.wake_at {
            if now < wake_at && !timed_out {
                self.stats.steps_blocked += 1;
                return Ok(StepStatus::Blocked);
            }
            if !timed_out {
                task.wake_at = None;
                if task.body.is_none() {
                    task.complete(Value::Void);
                    trace!(task = %id, "timer fired");
                    return Ok(StepStatus::Done);
                }
            }
        }

        if timed_out {
            let message = format!("Task {} timed out", id.inner());
            task.complete(Value::error("Timeout", message));
            self.stats.timeouts += 1;
            debug!(task = %id, "timed out");
            return Ok(StepStatus::Done);
        }

        let Some(body) = task.body.clone() else {
            task.complete(Value::Void);
            return Ok(StepStatus::Done);
        };
        self.run_statement(id, body, exec)
    }

    fn run_statement<E>(
        &mut self,
        id: TaskId,
        body: Arc<FunctionDecl>,
        exec: &mut E,
    ) -> RuntimeResult<StepStatus>
    where
        E: StatementExecutor + ?Sized,
    {
        let trace_steps = self.config.trace_steps;
        let Some(task) = self.tasks.get_mut(&id) else {
            return Ok(StepStatus::Done);
        };
        if !task.is_started {
            task.scope = Some(task.initial_scope());
            task.is_started = true;
        }
        let pc = task.current_statement_index;
        let Some(stmt) = body.body.get(pc) else {
            task.complete(Value::Void);
            return Ok(StepStatus::Done);
        };
        let scope = task.scope.clone().unwrap_or_default();
        let positions = std::mem::take(&mut task.positions);
        let auto_yield = task.auto_yield;
        task.steps += 1;
        self.stats.steps_executed += 1;
        if trace_steps {
            debug!(task = %id, pc, "step");
        } else {
            trace!(task = %id, pc, "step");
        }

        self.active.push(id);
        let mut guard = StepGuard::enter(exec, id, auto_yield, scope, positions);
        let outcome = guard.executor().execute_statement(stmt, self);
        self.active.pop();

        let suspended = matches!(outcome, Err(Signal::Suspend { .. }));
        let advance = match outcome {
            Ok(()) => true,
            Err(Signal::Suspend { from_loop }) => !from_loop,
            Err(Signal::Return(value)) => {
                let (scope, _) = guard.finish();
                let Some(task) = self.tasks.get_mut(&id) else {
                    return Ok(StepStatus::Done);
                };
                task.scope = Some(scope);
                task.complete(value);
                return Ok(StepStatus::Done);
            }
            Err(signal) => {
                drop(guard);
                return Err(signal.into_fault());
            }
        };

        let (scope, positions) = guard.finish();
        let Some(task) = self.tasks.get_mut(&id) else {
            return Ok(StepStatus::Done);
        };
        task.scope = Some(scope);
        task.positions = positions;
        if advance {
            task.current_statement_index += 1;
        }
        // A suspended task always gets another turn, even past its last
        // statement; that turn completes it.
        if suspended {
            return Ok(StepStatus::Pending);
        }
        if task.current_statement_index >= body.body.len() {
            task.complete(Value::Void);
            return Ok(StepStatus::Done);
        }
        Ok(StepStatus::Pending)
    }
}
