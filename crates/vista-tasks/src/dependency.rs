//! Task Dependency Handle (C5): a reference-counted handle distinct from the
//! task's `Arc` strong count. The last `Dependency` to drop on an unfinished
//! task cancels it — a task nobody still depends on is work nobody wants.

use alloc::sync::Arc;

use crate::task::TaskState;

/// Owns one unit of a task's `share_count`. Cheap to clone; dropping the
/// last outstanding clone on a task that has not finished cancels it
/// (§3 invariant 4, §4.5).
///
/// Deliberately distinct from the task's own `Arc` strong count: a
/// [`crate::promise::Promise`] also holds an `Arc<TaskState<T>>` but does
/// *not* participate in `share_count`, so a producer can keep writing to a
/// task after every reader has given up on it (the write simply becomes
/// moot — the task is already cancelled).
pub struct Dependency<T> {
    task: Arc<TaskState<T>>,
}

impl<T> Dependency<T> {
    /// Takes one unit of `share_count` on `task`.
    pub fn new(task: Arc<TaskState<T>>) -> Self {
        task.increment_share_count();
        Self { task }
    }

    /// Borrows the underlying task without affecting `share_count`.
    pub fn task(&self) -> &Arc<TaskState<T>> {
        &self.task
    }

    /// Returns the underlying `Arc`, cloned — does not itself take another
    /// unit of `share_count` (use [`Dependency::clone`] for that).
    pub fn task_arc(&self) -> Arc<TaskState<T>> {
        Arc::clone(&self.task)
    }
}

impl<T> Clone for Dependency<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.task))
    }
}

impl<T> Drop for Dependency<T> {
    fn drop(&mut self) {
        self.task.decrement_share_count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_drop_cancels_unfinished_task() {
        let task = TaskState::<u32>::new();
        let dep = Dependency::new(Arc::clone(&task));
        let dep2 = dep.clone();
        assert!(!task.is_cancelled());
        drop(dep);
        assert!(!task.is_cancelled());
        drop(dep2);
        assert!(task.is_cancelled());
    }

    #[test]
    fn dropping_dependency_on_finished_task_does_not_cancel() {
        let task = TaskState::<u32>::new();
        let dep = Dependency::new(Arc::clone(&task));
        task.set_started().unwrap();
        task.set_results(1).unwrap();
        task.set_finished();
        drop(dep);
        assert!(!task.is_cancelled());
        assert!(task.is_finished());
    }
}
