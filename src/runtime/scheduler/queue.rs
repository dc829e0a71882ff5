//! Ready queue for the scheduler
//!
//! Single-threaded FIFO of task IDs. A task that is still pending after its
//! step goes to the back, which gives plain round-robin interleaving.

use std::collections::VecDeque;

use super::task::TaskId;

/// FIFO of runnable task IDs.
#[derive(Debug, Clone, Default)]
pub struct ReadyQueue {
    inner: VecDeque<TaskId>,
}

impl ReadyQueue {
    /// Create a new empty queue.
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: VecDeque::new(),
        }
    }

    /// Push a task to the back of the queue.
    #[inline]
    pub fn push(
        &mut self,
        id: TaskId,
    ) {
        self.inner.push_back(id);
    }

    /// Pop a task from the front of the queue.
    #[inline]
    pub fn pop_front(&mut self) -> Option<TaskId> {
        self.inner.pop_front()
    }

    /// Whether `id` is queued.
    #[inline]
    pub fn contains(
        &self,
        id: TaskId,
    ) -> bool {
        self.inner.contains(&id)
    }

    /// Get the number of queued tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Queued IDs, front first.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.inner.iter().copied()
    }
}
