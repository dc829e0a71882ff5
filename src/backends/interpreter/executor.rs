//! Statement execution
//!
//! Every statement list resumes from the index saved in the running body's
//! [`StatementPositions`], which is what lets a task suspend in the middle of
//! a loop or a branch and pick up at the same place on its next step.

use tracing::trace;

use super::Interpreter;
use crate::frontend::ast::{Expr, Stmt};
use crate::runtime::errors::RuntimeError;
use crate::runtime::scheduler::{BindingSite, Future, Scheduler};
use crate::runtime::scope::StatementPositions;
use crate::runtime::signal::{ExecResult, Signal};
use crate::runtime::value::Value;

impl Interpreter {
    pub(super) fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value, scheduler)?;
                self.bind_future_variable(name, true, &value, scheduler);
                self.define_local(name, value);
                Ok(())
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value, scheduler)?;
                self.bind_future_variable(target, false, &value, scheduler);
                self.assign(target, value)?;
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scheduler)?;
                Ok(())
            }
            Stmt::Print(expr) => {
                let value = self.eval(expr, scheduler)?;
                self.emit(value.to_string());
                Ok(())
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scheduler)?,
                    None => Value::Void,
                };
                Err(Signal::Return(value))
            }
            Stmt::Yield => {
                if self.current_task.is_some() {
                    return Err(Signal::YIELD);
                }
                scheduler.run_one_cycle(self)?;
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.exec_if(condition, then_branch, else_branch, scheduler),
            Stmt::While { condition, body } => self.exec_while(condition, body, scheduler),
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => self.exec_for(
                init.as_deref(),
                condition.as_ref(),
                update.as_deref(),
                body,
                scheduler,
            ),
            Stmt::Block(stmts) => self.execute_block(stmts, scheduler),
            Stmt::Break => Err(Signal::Break),
            Stmt::Continue => Err(Signal::Continue),
        }
    }

    /// Run a statement list from its saved position.
    ///
    /// On suspend the list records where to resume (the same statement if
    /// it was interrupted mid-way, the next one after an explicit `yield`)
    /// and re-raises a suspend that makes the enclosing statement re-enter.
    pub(super) fn execute_block(
        &mut self,
        stmts: &[Stmt],
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        let key = StatementPositions::key_of(stmts);
        let start = self.positions.get(key).unwrap_or(0);
        for (index, stmt) in stmts.iter().enumerate().skip(start) {
            match self.exec_stmt(stmt, scheduler) {
                Ok(()) => {}
                Err(Signal::Suspend { from_loop }) => {
                    let resume_at = if from_loop { index } else { index + 1 };
                    self.positions.set(key, resume_at);
                    return Err(Signal::LOOP_YIELD);
                }
                Err(other) => {
                    self.positions.clear(key);
                    return Err(other);
                }
            }
        }
        self.positions.clear(key);
        Ok(())
    }

    fn exec_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: &[Stmt],
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        // A suspended branch resumes without re-testing the condition.
        if self.positions.get(StatementPositions::key_of(then_branch)).is_some() {
            return self.execute_block(then_branch, scheduler);
        }
        if self.positions.get(StatementPositions::key_of(else_branch)).is_some() {
            return self.execute_block(else_branch, scheduler);
        }
        if self.eval_condition(condition, scheduler)? {
            self.execute_block(then_branch, scheduler)
        } else {
            self.execute_block(else_branch, scheduler)
        }
    }

    fn exec_while(
        &mut self,
        condition: &Expr,
        body: &[Stmt],
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        let key = StatementPositions::key_of(body);
        loop {
            let resuming = self.positions.get(key).is_some();
            if !resuming && !self.eval_condition(condition, scheduler)? {
                return Ok(());
            }
            match self.execute_block(body, scheduler) {
                Ok(()) | Err(Signal::Continue) => {}
                Err(Signal::Break) => return Ok(()),
                Err(other) => return Err(other),
            }
            self.end_iteration(scheduler)?;
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        update: Option<&Stmt>,
        body: &[Stmt],
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        let key = StatementPositions::key_of(body);
        if !self.positions.loop_entered(key) {
            if let Some(init) = init {
                self.exec_stmt(init, scheduler).map_err(|s| Signal::Fault(s.into_fault()))?;
            }
            self.positions.enter_loop(key);
        }

        let outcome = self.for_iterations(condition, update, body, scheduler);
        if matches!(outcome, Err(Signal::Suspend { .. })) {
            return outcome;
        }
        self.positions.exit_loop(key);
        if let Some(Stmt::Let { name, .. }) = init {
            self.scopes.current_mut().remove(name);
        }
        outcome
    }

    fn for_iterations(
        &mut self,
        condition: Option<&Expr>,
        update: Option<&Stmt>,
        body: &[Stmt],
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        let key = StatementPositions::key_of(body);
        loop {
            let resuming = self.positions.get(key).is_some();
            if !resuming {
                if let Some(condition) = condition {
                    if !self.eval_condition(condition, scheduler)? {
                        return Ok(());
                    }
                }
            }
            match self.execute_block(body, scheduler) {
                Ok(()) | Err(Signal::Continue) => {}
                Err(Signal::Break) => return Ok(()),
                Err(other) => return Err(other),
            }
            if let Some(update) = update {
                self.exec_stmt(update, scheduler).map_err(|s| Signal::Fault(s.into_fault()))?;
            }
            self.end_iteration(scheduler)?;
        }
    }

    /// Called after every finished loop iteration.
    ///
    /// Inside an auto-yield task this suspends so the task re-enters the
    /// loop on its next turn. Outside any task it lets queued tasks run.
    fn end_iteration(
        &mut self,
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        if self.current_task.is_some() {
            if self.auto_yield {
                trace!(task = ?self.current_task, "loop iteration suspend");
                return Err(Signal::LOOP_YIELD);
            }
        } else if scheduler.has_tasks() {
            scheduler.run_one_cycle(self)?;
        }
        Ok(())
    }

    fn eval_condition(
        &mut self,
        condition: &Expr,
        scheduler: &mut Scheduler,
    ) -> Result<bool, Signal> {
        let value = self.eval(condition, scheduler)?;
        value.to_bool().ok_or_else(|| {
            Signal::Fault(RuntimeError::TypeError(format!(
                "condition must be bool, found {}",
                value.type_name()
            )))
        })
    }

    /// Define in the innermost scope.
    pub(super) fn define_local(
        &mut self,
        name: &str,
        value: Value,
    ) {
        self.scopes.define(name, value);
    }

    /// Assign to a plain or dotted place (`x`, `self.count`, `a.b.c`).
    ///
    /// A dotted place updates the field inside the base aggregate and the
    /// flattened entry with the same name, when one exists.
    pub(super) fn assign(
        &mut self,
        target: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let Some((base, path)) = target.split_once('.') else {
            if self.scopes.assign_existing(target, value) {
                return Ok(());
            }
            return Err(RuntimeError::UndefinedVariable(target.to_string()));
        };

        let flattened = self.scopes.assign_existing(target, value.clone());
        match self.scopes.lookup_mut(base) {
            Some(aggregate) => {
                let segments: Vec<&str> = path.split('.').collect();
                set_field_path(aggregate, &segments, value)
            }
            None if flattened => Ok(()),
            None => Err(RuntimeError::UndefinedVariable(base.to_string())),
        }
    }

    /// Let a pending task publish its Future into `variable` when it
    /// finishes.
    ///
    /// A `let` binds in the innermost scope; an assignment targets the
    /// scope that already holds the name.
    fn bind_future_variable(
        &self,
        variable: &str,
        is_let: bool,
        value: &Value,
        scheduler: &mut Scheduler,
    ) {
        let Some(id) = Future::task_id_of(value) else {
            return;
        };
        if scheduler.is_task_finished(id) {
            return;
        }
        let site = if is_let {
            BindingSite::local(self, variable)
        } else {
            BindingSite::resolve(self, variable)
        };
        if let Some(site) = site {
            scheduler.bind_future(id, site);
        }
    }
}

fn set_field_path(
    slot: &mut Value,
    path: &[&str],
    value: Value,
) -> Result<(), RuntimeError> {
    let Some((first, rest)) = path.split_first() else {
        *slot = value;
        return Ok(());
    };
    let fields = slot.as_struct_mut().ok_or_else(|| {
        RuntimeError::TypeError(format!("cannot assign to field `{}` of a non-struct", first))
    })?;
    if rest.is_empty() {
        fields.set_field(*first, value);
        return Ok(());
    }
    let inner = fields
        .field_mut(first)
        .ok_or_else(|| RuntimeError::FieldNotFound((*first).to_string()))?;
    set_field_path(inner, rest, value)
}
