//! Runtime errors

use thiserror::Error;

use crate::runtime::scheduler::TaskId;

/// Runtime result
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Faults raised while running statements.
///
/// The scheduler never catches these; they abort the scheduling tick that
/// was running when they were raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Function {name} expects {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Call depth exceeded (max {0})")]
    CallDepthExceeded(usize),

    #[error("Value of type {0} is not awaitable")]
    NotAwaitable(String),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Await on {0} stalled: ready queue drained before it completed")]
    AwaitStalled(TaskId),

    #[error("`{0}` escaped its enclosing construct")]
    StrayControl(&'static str),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}
