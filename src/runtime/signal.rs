//! Control-transfer signals
//!
//! Statement execution unwinds through `Err(Signal)`. Only `Suspend` and
//! `Return` are intercepted at a task's step boundary; `Fault` always
//! propagates to whoever drove the scheduler.

use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

/// Result of executing a statement
pub type ExecResult<T = ()> = Result<T, Signal>;

/// Non-local exit from a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Pause the running task.
    ///
    /// `from_loop` marks an automatic per-iteration suspend (or an explicit
    /// `yield` rethrown by a loop): the task re-enters the same top-level
    /// statement on its next turn instead of advancing.
    Suspend { from_loop: bool },
    /// Explicit `return`
    Return(Value),
    Break,
    Continue,
    /// Any other fault
    Fault(RuntimeError),
}

impl Signal {
    /// Explicit `yield`
    pub const YIELD: Signal = Signal::Suspend { from_loop: false };

    /// Automatic suspend raised by a loop iteration
    pub const LOOP_YIELD: Signal = Signal::Suspend { from_loop: true };

    /// Turn a signal that escaped every handler into a fault
    pub fn into_fault(self) -> RuntimeError {
        match self {
            Signal::Fault(e) => e,
            Signal::Break => RuntimeError::StrayControl("break"),
            Signal::Continue => RuntimeError::StrayControl("continue"),
            Signal::Suspend { .. } => RuntimeError::StrayControl("yield"),
            Signal::Return(_) => RuntimeError::StrayControl("return"),
        }
    }
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::Fault(e)
    }
}
