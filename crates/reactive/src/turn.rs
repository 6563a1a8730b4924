//! End-of-turn task queue.
//!
//! Deferred work is scheduled here and runs when the owner ends the current
//! turn. Scheduled tasks can be cancelled until they run.

use alloc::collections::VecDeque;

/// Identifier of a scheduled task.
pub type TaskId = u64;

/// FIFO of tasks that run at the end of the current turn.
#[derive(Debug)]
pub struct TurnQueue<T> {
    tasks: VecDeque<(TaskId, T)>,
    next_id: TaskId,
}

impl<T> Default for TurnQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TurnQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Schedules a task and returns its id.
    pub fn schedule(&mut self, task: T) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push_back((id, task));
        id
    }

    /// Cancels a scheduled task. Returns false if it already ran or was
    /// never scheduled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.iter().position(|(task, _)| *task == id) {
            Some(index) => self.tasks.remove(index).is_some(),
            None => false,
        }
    }

    /// Takes the next task to run.
    #[inline]
    pub fn pop(&mut self) -> Option<(TaskId, T)> {
        self.tasks.pop_front()
    }

    /// Returns true if a task with this id is still scheduled.
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|(task, _)| *task == id)
    }

    /// Returns the number of scheduled tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing is scheduled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_in_schedule_order() {
        let mut queue = TurnQueue::new();
        let a = queue.schedule("a");
        let b = queue.schedule("b");
        assert_eq!(queue.pop(), Some((a, "a")));
        assert_eq!(queue.pop(), Some((b, "b")));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_cancel() {
        let mut queue = TurnQueue::new();
        let a = queue.schedule(1);
        let b = queue.schedule(2);
        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));
        assert!(!queue.is_scheduled(a));
        assert!(queue.is_scheduled(b));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some((b, 2)));
        assert!(!queue.cancel(b));
    }
}
