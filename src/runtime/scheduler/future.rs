//! One-shot completion slot read by `await`.

use super::task::TaskId;
use crate::runtime::value::{StructValue, Value};

/// Type name of the Future aggregate seen by programs.
pub const FUTURE_TYPE: &str = "Future";

/// Completion slot of an async task.
///
/// `is_ready` goes from false to true exactly once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Future {
    /// Result payload, `Void` until ready
    pub value: Value,
    /// Whether the owning task has finished
    pub is_ready: bool,
}

impl Future {
    /// A slot that is not ready yet.
    #[inline]
    pub fn pending() -> Self {
        Self::default()
    }

    /// A slot that already holds a value.
    #[inline]
    pub fn ready(value: Value) -> Self {
        Self {
            value,
            is_ready: true,
        }
    }

    /// Store the value and flip `is_ready`. Returns false (and changes
    /// nothing) if the slot was already ready.
    pub fn resolve(
        &mut self,
        value: Value,
    ) -> bool {
        if self.is_ready {
            return false;
        }
        self.value = value;
        self.is_ready = true;
        true
    }

    /// Aggregate form handed to programs. `task_id` lets `await` find the
    /// task that owns the slot.
    pub fn to_value(
        &self,
        task_id: Option<TaskId>,
    ) -> Value {
        let mut s = StructValue::new(FUTURE_TYPE)
            .with_field("value", self.value.clone())
            .with_field("is_ready", Value::Bool(self.is_ready));
        if let Some(id) = task_id {
            s.set_field("task_id", Value::Int(id.inner() as i64));
        }
        Value::Struct(s)
    }

    /// Read a Future-shaped aggregate back.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_struct_of(FUTURE_TYPE) {
            return None;
        }
        Some(Self {
            value: value.field("value").cloned().unwrap_or_default(),
            is_ready: value.field("is_ready").and_then(Value::to_bool).unwrap_or(false),
        })
    }

    /// Task that owns a Future-shaped aggregate.
    pub fn task_id_of(value: &Value) -> Option<TaskId> {
        if !value.is_struct_of(FUTURE_TYPE) {
            return None;
        }
        let id = value.field("task_id")?.to_int()?;
        usize::try_from(id).ok().map(TaskId)
    }
}
