//! Runtime system
//!
//! Values, scopes, control signals and the cooperative task scheduler.

pub mod errors;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod value;

pub use errors::{RuntimeError, RuntimeResult};
pub use scheduler::{Scheduler, SchedulerConfig, StepStatus, TaskId};
pub use signal::{ExecResult, Signal};
pub use value::Value;
