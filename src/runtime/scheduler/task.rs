//! Task definitions for the scheduler.
//!
//! An [`AsyncTask`] holds everything needed to resume one asynchronous call:
//! the body, its evaluated arguments, a program counter into the body's
//! top-level statements, the private scope snapshot and the completion slot.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::future::Future;
use crate::frontend::ast::FunctionDecl;
use crate::backends::StatementExecutor;
use crate::runtime::scope::{Scope, ScopeId, StatementPositions};
use crate::runtime::value::{Value, ValueKind};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl From<TaskId> for usize {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Monotonic task ID source. IDs are never reused.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: usize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Generate the next task ID.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        TaskId(id)
    }

    /// The ID the next call to `next` will hand out.
    #[inline]
    pub fn peek(&self) -> TaskId {
        TaskId(self.next_id)
    }
}

/// Observable task state. A task is in exactly one of these at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Registered, no statement executed yet
    NotStarted,
    /// Started and runnable
    Runnable,
    /// Blocked until another task finishes
    Waiting,
    /// Blocked until its wake time
    Sleeping,
    /// Completed (normally, by return, or by timeout)
    Finished,
}

/// A caller-side variable, pinned to the scope that held it when the
/// task was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSite {
    /// Variable name as written by the caller
    pub variable: String,
    /// Scope the variable lives in
    pub frame: ScopeId,
    /// Task whose private scope `frame` is, when the caller was a task step
    pub owner: Option<TaskId>,
}

impl BindingSite {
    /// Pin `variable` to the innermost scope that binds it.
    pub fn resolve<E>(
        exec: &E,
        variable: &str,
    ) -> Option<Self>
    where
        E: StatementExecutor + ?Sized,
    {
        let frame = exec.binding_frame(variable)?;
        Some(Self::new(exec, variable, frame))
    }

    /// Pin `variable` to the innermost scope, where a `let` defines it.
    pub fn local<E>(
        exec: &E,
        variable: &str,
    ) -> Option<Self>
    where
        E: StatementExecutor + ?Sized,
    {
        let frame = exec.current_frame()?;
        Some(Self::new(exec, variable, frame))
    }

    fn new<E>(
        exec: &E,
        variable: &str,
        frame: ScopeId,
    ) -> Self
    where
        E: StatementExecutor + ?Sized,
    {
        Self {
            variable: variable.to_string(),
            frame,
            owner: exec.current_task_id(),
        }
    }
}

/// Receiver captured by an async method call
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    /// The `self` aggregate, captured by value
    pub value: Value,
    /// Caller-side variable that receives the write-back
    pub site: Option<BindingSite>,
}

/// Resumable state of one asynchronous call
#[derive(Debug, Clone)]
pub struct AsyncTask {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) body: Option<Arc<FunctionDecl>>,
    pub(crate) args: Vec<Value>,
    pub(crate) receiver: Option<Receiver>,

    pub(crate) current_statement_index: usize,
    pub(crate) scope: Option<Scope>,
    pub(crate) positions: StatementPositions,

    pub(crate) is_started: bool,
    pub(crate) is_executed: bool,
    pub(crate) waiting_for: Option<TaskId>,
    pub(crate) wake_at: Option<Instant>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) auto_yield: bool,

    pub(crate) result: Option<Value>,
    pub(crate) result_kind: Option<ValueKind>,
    pub(crate) future: Future,
    pub(crate) future_binding: Option<BindingSite>,
    pub(crate) receiver_synced: bool,
    pub(crate) steps: usize,
}

impl AsyncTask {
    /// Create a task that runs `body` with already-evaluated arguments.
    pub fn new(
        body: Arc<FunctionDecl>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            name: body.qualified_name(),
            body: Some(body),
            ..Self::timer()
        }
        .with_args(args)
    }

    /// Create a bodyless task that only serves as a timer.
    pub fn timer() -> Self {
        Self {
            id: TaskId(usize::MAX),
            name: "sleep".to_string(),
            body: None,
            args: Vec::new(),
            receiver: None,
            current_statement_index: 0,
            scope: None,
            positions: StatementPositions::new(),
            is_started: false,
            is_executed: false,
            waiting_for: None,
            wake_at: None,
            deadline: None,
            auto_yield: false,
            result: None,
            result_kind: None,
            future: Future::pending(),
            future_binding: None,
            receiver_synced: false,
            steps: 0,
        }
    }

    fn with_args(
        mut self,
        args: Vec<Value>,
    ) -> Self {
        self.args = args;
        self
    }

    /// Capture a receiver for an async method call.
    pub fn with_receiver(
        mut self,
        value: Value,
        site: Option<BindingSite>,
    ) -> Self {
        self.receiver = Some(Receiver { value, site });
        self
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function body, if this is not a pure timer.
    #[inline]
    pub fn body(&self) -> Option<&Arc<FunctionDecl>> {
        self.body.as_ref()
    }

    /// Number of top-level statements in the body.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, |b| b.body.len())
    }

    /// Captured receiver, if any.
    #[inline]
    pub fn receiver(&self) -> Option<&Receiver> {
        self.receiver.as_ref()
    }

    /// Program counter into the body's top-level statements.
    #[inline]
    pub fn current_statement_index(&self) -> usize {
        self.current_statement_index
    }

    /// Saved private scope (materialized on the first step).
    #[inline]
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    #[inline]
    pub fn is_executed(&self) -> bool {
        self.is_executed
    }

    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.waiting_for.is_some()
    }

    /// Task this one is waiting on.
    #[inline]
    pub fn waiting_for(&self) -> Option<TaskId> {
        self.waiting_for
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.wake_at.is_some()
    }

    /// Absolute wake time while sleeping.
    #[inline]
    pub fn wake_at(&self) -> Option<Instant> {
        self.wake_at
    }

    #[inline]
    pub fn has_timeout(&self) -> bool {
        self.deadline.is_some()
    }

    /// Absolute timeout deadline.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the scheduler suspends this task after every loop iteration.
    #[inline]
    pub fn auto_yield(&self) -> bool {
        self.auto_yield
    }

    /// Stored return payload once finished.
    #[inline]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Kind of the stored payload once finished.
    #[inline]
    pub fn result_kind(&self) -> Option<ValueKind> {
        self.result_kind
    }

    /// Completion slot.
    #[inline]
    pub fn future(&self) -> &Future {
        &self.future
    }

    /// Variable the completion slot is bound to.
    #[inline]
    pub fn future_binding(&self) -> Option<&BindingSite> {
        self.future_binding.as_ref()
    }

    /// Number of steps that executed a statement of this task.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        if self.is_executed {
            TaskState::Finished
        } else if self.waiting_for.is_some() {
            TaskState::Waiting
        } else if self.wake_at.is_some() {
            TaskState::Sleeping
        } else if self.is_started {
            TaskState::Runnable
        } else {
            TaskState::NotStarted
        }
    }

    /// Build the private scope from the arguments and the receiver.
    ///
    /// The receiver is bound as `self` plus one flattened `self.<field>`
    /// entry per field.
    pub(crate) fn initial_scope(&self) -> Scope {
        let mut scope = Scope::new();
        if let Some(body) = &self.body {
            for (param, arg) in body.params.iter().zip(&self.args) {
                scope.define(param.clone(), arg.clone());
            }
        }
        if let Some(receiver) = &self.receiver {
            scope.define("self", receiver.value.clone());
            if let Some(fields) = receiver.value.as_struct() {
                for (name, value) in &fields.fields {
                    scope.define(format!("self.{}", name), value.clone());
                }
            }
        }
        scope
    }

    /// Finish the task with `payload`.
    ///
    /// The payload is stored as-is along with its kind. A Future-shaped
    /// payload is unwrapped before it reaches the completion slot so
    /// futures never nest.
    pub(crate) fn complete(
        &mut self,
        payload: Value,
    ) {
        self.is_executed = true;
        self.waiting_for = None;
        self.wake_at = None;
        let slot_value = match Future::from_value(&payload) {
            Some(inner) => inner.value,
            None => payload.clone(),
        };
        self.result_kind = Some(payload.kind());
        self.result = Some(payload);
        self.future.resolve(slot_value);
    }

    /// First-level `self.<member>` entries of the saved scope.
    pub(crate) fn receiver_members(&self) -> Vec<(String, Value)> {
        let Some(scope) = &self.scope else {
            return Vec::new();
        };
        scope
            .iter()
            .filter_map(|(name, value)| {
                let member = name.strip_prefix("self.")?;
                (!member.contains('.')).then(|| (member.to_string(), value.clone()))
            })
            .collect()
    }

    /// Serializable summary for introspection.
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            name: self.name.clone(),
            state: self.state(),
            statement_index: self.current_statement_index,
            body_len: self.body_len(),
            steps: self.steps,
            auto_yield: self.auto_yield,
            is_ready: self.future.is_ready,
            result_kind: self.result_kind,
            result: self.result.clone(),
        }
    }
}

/// Serializable view of a task, used by `cbloop tasks`
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    pub statement_index: usize,
    pub body_len: usize,
    pub steps: usize,
    pub auto_yield: bool,
    pub is_ready: bool,
    pub result_kind: Option<ValueKind>,
    pub result: Option<Value>,
}
