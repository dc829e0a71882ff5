//! Backend abstraction layer for statement execution
//!
//! The scheduler drives tasks one top-level statement at a time, but it does
//! not know how statements run. Whatever evaluates statements implements
//! [`StatementExecutor`], and the scheduler talks to it only through this
//! trait.
//!
//! # Architecture
//!
//! ```text
//!   Program (RON)
//!         |
//!         v
//!    Interpreter  <---- execute_statement ----+
//!         |                                  |
//!         +---- register / await / sleep --> Scheduler
//! ```

pub mod interpreter;

use serde::{Deserialize, Serialize};

use crate::frontend::ast::Stmt;
use crate::runtime::scheduler::{Scheduler, TaskId};
use crate::runtime::scope::{Scope, ScopeId, StatementPositions};
use crate::runtime::signal::ExecResult;

/// Interpreter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Also write `print` output to stdout (it is always captured)
    pub echo_output: bool,
    /// Run one scheduler cycle after every top-level statement of `main`
    pub background_cycles: bool,
    /// Maximum nesting of synchronous calls
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            echo_output: true,
            background_cycles: true,
            max_call_depth: 256,
        }
    }
}

/// Capabilities the scheduler needs from a statement executor.
///
/// `execute_statement` receives the scheduler explicitly so statements can
/// register tasks, await them or put timers to sleep while a task step is
/// in progress.
pub trait StatementExecutor {
    /// Execute one statement in the current scope.
    fn execute_statement(
        &mut self,
        stmt: &Stmt,
        scheduler: &mut Scheduler,
    ) -> ExecResult;

    /// Push a scope holding a copy of `scope`'s bindings.
    fn push_scope(
        &mut self,
        scope: Scope,
    );

    /// Pop the innermost scope.
    fn pop_scope(&mut self) -> Option<Scope>;

    /// Current number of scopes.
    fn scope_depth(&self) -> usize;

    /// Pop scopes until `depth` remain.
    fn truncate_scopes(
        &mut self,
        depth: usize,
    );

    /// Scope at `index` (0 is the outermost).
    fn scope_at(
        &self,
        index: usize,
    ) -> Option<&Scope>;

    /// Task whose step is running, if any.
    fn current_task_id(&self) -> Option<TaskId>;

    fn set_current_task_id(
        &mut self,
        id: Option<TaskId>,
    );

    /// Whether loops suspend after every iteration.
    fn auto_yield_mode(&self) -> bool;

    fn set_auto_yield_mode(
        &mut self,
        enabled: bool,
    );

    /// Install a statement-position table, returning the previous one.
    fn replace_statement_positions(
        &mut self,
        positions: StatementPositions,
    ) -> StatementPositions;

    /// Identity of the innermost scope.
    fn current_frame(&self) -> Option<ScopeId>;

    /// Identity of the innermost scope that binds `name`.
    fn binding_frame(
        &self,
        name: &str,
    ) -> Option<ScopeId>;

    /// The scope with identity `id`, if it is still on the stack.
    fn frame_mut(
        &mut self,
        id: ScopeId,
    ) -> Option<&mut Scope>;
}
