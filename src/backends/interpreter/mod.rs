//! Tree-walking interpreter backend
//!
//! Executes the statement tree of a [`Program`] directly. The interpreter
//! owns the scope stack the scheduler borrows during a task step, and it
//! turns `async` calls, `await`, `sleep` and `timeout` into scheduler
//! operations.

mod eval;
mod executor;


use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backends::{InterpreterConfig, StatementExecutor};
use crate::frontend::ast::{FunctionDecl, Program, Stmt, StructDecl};
use crate::runtime::errors::RuntimeResult;
use crate::runtime::scheduler::{Scheduler, TaskId};
use crate::runtime::scope::{Scope, ScopeId, ScopeStack, StatementPositions};
use crate::runtime::signal::{ExecResult, Signal};
use crate::runtime::value::Value;

/// The statement interpreter
pub struct Interpreter {
    /// Scope stack, global scope at the bottom
    scopes: ScopeStack,
    /// Function table keyed by qualified name (`f`, `Type.method`)
    functions: HashMap<String, Arc<FunctionDecl>>,
    /// Declared struct types
    structs: HashMap<String, StructDecl>,
    /// Task whose step is running
    current_task: Option<TaskId>,
    /// Whether loops suspend after each iteration
    auto_yield: bool,
    /// Resume positions of the running body
    positions: StatementPositions,
    /// Nesting of synchronous calls
    call_depth: usize,
    /// Captured `print` output
    output: Vec<String>,
    config: InterpreterConfig,
}

impl fmt::Debug for Interpreter {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut functions: Vec<&String> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("Interpreter")
            .field("scope_depth", &self.scopes.depth())
            .field("functions", &functions)
            .field("current_task", &self.current_task)
            .field("auto_yield", &self.auto_yield)
            .field("call_depth", &self.call_depth)
            .field("output_lines", &self.output.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create a new interpreter with default configuration
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    /// Create an interpreter with custom configuration
    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            scopes: ScopeStack::new(),
            functions: HashMap::new(),
            structs: HashMap::new(),
            current_task: None,
            auto_yield: false,
            positions: StatementPositions::new(),
            call_depth: 0,
            output: Vec::new(),
            config,
        }
    }

    /// Register the declarations of a program.
    pub fn load(
        &mut self,
        program: &Program,
    ) {
        for decl in &program.structs {
            self.structs.insert(decl.name.clone(), decl.clone());
        }
        for func in &program.functions {
            self.define_function(func.clone());
        }
        debug!(
            functions = self.functions.len(),
            structs = self.structs.len(),
            "program loaded"
        );
    }

    /// Add (or replace) a function.
    pub fn define_function(
        &mut self,
        func: FunctionDecl,
    ) -> Arc<FunctionDecl> {
        let func = Arc::new(func);
        self.functions.insert(func.qualified_name(), Arc::clone(&func));
        func
    }

    /// Look up a function by qualified name.
    pub fn function(
        &self,
        name: &str,
    ) -> Option<&Arc<FunctionDecl>> {
        self.functions.get(name)
    }

    /// Load a program, execute `main` and drain the scheduler.
    pub fn run_program(
        &mut self,
        program: &Program,
        scheduler: &mut Scheduler,
    ) -> RuntimeResult<()> {
        self.load(program);
        info!(statements = program.main.len(), "running main");
        self.run_main(&program.main, scheduler)?;
        scheduler.run(self)?;
        info!(tasks = scheduler.task_count(), "program finished");
        Ok(())
    }

    fn run_main(
        &mut self,
        main: &[Stmt],
        scheduler: &mut Scheduler,
    ) -> RuntimeResult<()> {
        for stmt in main {
            match self.execute_statement(stmt, scheduler) {
                Ok(()) => {}
                Err(Signal::Return(_)) => break,
                Err(signal) => return Err(signal.into_fault()),
            }
            if self.config.background_cycles && scheduler.has_tasks() {
                scheduler.run_one_cycle(self)?;
            }
        }
        Ok(())
    }

    /// Captured `print` output, one entry per line.
    #[inline]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Take the captured output, leaving it empty.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Read a global variable.
    pub fn global(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.scopes.at(0).and_then(|scope| scope.get(name))
    }

    /// Define a global variable.
    pub fn set_global(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) {
        self.scopes.global_mut().define(name, value);
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    fn emit(
        &mut self,
        line: String,
    ) {
        if self.config.echo_output {
            println!("{}", line);
        }
        self.output.push(line);
    }
}

impl StatementExecutor for Interpreter {
    fn execute_statement(
        &mut self,
        stmt: &Stmt,
        scheduler: &mut Scheduler,
    ) -> ExecResult {
        self.exec_stmt(stmt, scheduler)
    }

    fn push_scope(
        &mut self,
        scope: Scope,
    ) {
        self.scopes.push_scope(scope);
    }

    fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    fn truncate_scopes(
        &mut self,
        depth: usize,
    ) {
        self.scopes.truncate(depth);
    }

    fn scope_at(
        &self,
        index: usize,
    ) -> Option<&Scope> {
        self.scopes.at(index)
    }

    fn current_task_id(&self) -> Option<TaskId> {
        self.current_task
    }

    fn set_current_task_id(
        &mut self,
        id: Option<TaskId>,
    ) {
        self.current_task = id;
    }

    fn auto_yield_mode(&self) -> bool {
        self.auto_yield
    }

    fn set_auto_yield_mode(
        &mut self,
        enabled: bool,
    ) {
        self.auto_yield = enabled;
    }

    fn replace_statement_positions(
        &mut self,
        positions: StatementPositions,
    ) -> StatementPositions {
        std::mem::replace(&mut self.positions, positions)
    }

    fn current_frame(&self) -> Option<ScopeId> {
        self.scopes.current_id()
    }

    fn binding_frame(
        &self,
        name: &str,
    ) -> Option<ScopeId> {
        self.scopes.frame_of(name)
    }

    fn frame_mut(
        &mut self,
        id: ScopeId,
    ) -> Option<&mut Scope> {
        self.scopes.frame_mut(id)
    }
}
