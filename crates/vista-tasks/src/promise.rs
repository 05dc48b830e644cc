//! Promise (C7): the write-side handle.
//!
//! A `Promise<T>` owns a strong, non-share-counted `Arc<TaskState<T>>` —
//! distinct from the share-counted [`crate::Dependency`] handles its
//! `Future`s hold, so a producer may keep writing to a task after every
//! reader has dropped its future (the write is simply moot; the task is
//! already cancelled).

use alloc::sync::Arc;

use crate::dependency::Dependency;
use crate::error::{CapturedError, TaskError};
use crate::future::{Future, SharedFuture};
use crate::task::{EventPump, TaskState};

/// Write-side handle produced alongside a fresh task.
pub struct Promise<T> {
    task: Arc<TaskState<T>>,
    future_taken: bool,
}

impl<T> Promise<T> {
    /// A fresh promise backed by a worker-thread task (C3).
    pub fn new() -> Self {
        Self {
            task: TaskState::new(),
            future_taken: false,
        }
    }

    /// A fresh promise backed by a main-thread task (C4): progress updates
    /// pump `pump` so the host UI stays responsive.
    pub fn main_thread(pump: Arc<dyn EventPump>) -> Self {
        Self {
            task: TaskState::with_event_pump(pump),
            future_taken: false,
        }
    }

    /// Wraps an already-constructed task, for callers (the `then`-family)
    /// that build the task themselves before attaching its write side.
    pub(crate) fn from_task(task: Arc<TaskState<T>>) -> Self {
        Self {
            task,
            future_taken: false,
        }
    }

    /// The underlying task, for code that needs to report progress or add
    /// watchers directly (e.g. [`crate::continuation`], [`crate::manager`]).
    pub fn task_arc(&self) -> Arc<TaskState<T>> {
        Arc::clone(&self.task)
    }

    pub(crate) fn task_ref(&self) -> &Arc<TaskState<T>> {
        &self.task
    }

    pub fn set_started(&self) -> Result<bool, TaskError> {
        self.task.set_started()
    }

    pub fn set_finished(&self) {
        self.task.set_finished()
    }

    pub fn cancel(&self) {
        self.task.cancel()
    }

    pub fn set_exception(&self, e: CapturedError) {
        self.task.set_exception(e)
    }

    /// Writes the result (precondition: the result slot is empty).
    pub fn set_results(&self, value: T) -> Result<(), TaskError> {
        self.task.set_results(value)
    }

    /// Produces one [`Future`]. May be called at most once per promise
    /// (debug-enforced; §4.7).
    pub fn future(&mut self) -> Future<T> {
        debug_assert!(!self.future_taken, "future() called twice on the same Promise");
        self.future_taken = true;
        Future::from_dependency(Dependency::new(Arc::clone(&self.task)))
    }

    /// Produces a [`SharedFuture`]. May be called any number of times.
    pub fn shared_future(&self) -> SharedFuture<T> {
        SharedFuture::from_dependency(Dependency::new(Arc::clone(&self.task)))
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Promise<T> {
    /// An already-finished promise carrying `value`.
    pub fn immediate(value: T) -> Self {
        let promise = Self::new();
        promise.task.set_started().expect("fresh task cannot already be finished");
        promise
            .task
            .set_results(value)
            .expect("fresh task cannot already hold a result");
        promise.task.set_finished();
        promise
    }

    /// An already-finished promise carrying `error`.
    pub fn failed(error: CapturedError) -> Self {
        let promise = Self::new();
        promise.task.set_started().expect("fresh task cannot already be finished");
        promise.task.set_exception(error);
        promise.task.set_finished();
        promise
    }

    /// An already-cancelled promise.
    pub fn cancelled() -> Self {
        let promise = Self::new();
        promise.task.cancel();
        let _ = promise.task.set_started();
        promise.task.set_finished();
        promise
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // §4.7: a producer that abandons a live, unfinished promise still
        // must not leave the task stuck short of `Finished` — invariant 2
        // (a task is destroyed only once `Finished`) depends on this.
        if !self.task.is_finished() {
            let _ = self.task.set_started();
            self.task.set_finished();
        }
    }
}

/// A [`Promise`]-like handle whose cancellation is mutually coupled with a
/// parent/child chain of sibling operations (§4.7's "synchronous
/// operation"): on destruction it finishes the task only if it is the
/// "master" holder captured at construction time, and cancelling either side
/// of a `sub_operation` pairing cancels the other.
///
/// Holds the task directly rather than wrapping a [`Promise`]: `Promise`'s
/// own destructor unconditionally force-finishes, which would defeat the
/// master/non-master distinction this type exists for.
pub struct SynchronousOperation<T> {
    task: Arc<TaskState<T>>,
    future_taken: bool,
    is_master: bool,
}

impl<T: Send + 'static> SynchronousOperation<T> {
    /// A fresh, master synchronous operation.
    pub fn new() -> Self {
        Self {
            task: TaskState::new(),
            future_taken: false,
            is_master: true,
        }
    }

    pub fn task_arc(&self) -> Arc<TaskState<T>> {
        Arc::clone(&self.task)
    }

    /// Produces one [`Future`]. May be called at most once (§4.7).
    pub fn future(&mut self) -> Future<T> {
        debug_assert!(!self.future_taken, "future() called twice on the same operation");
        self.future_taken = true;
        Future::from_dependency(Dependency::new(Arc::clone(&self.task)))
    }

    pub fn shared_future(&self) -> SharedFuture<T> {
        SharedFuture::from_dependency(Dependency::new(Arc::clone(&self.task)))
    }

    pub fn set_started(&self) -> Result<bool, TaskError> {
        self.task.set_started()
    }

    pub fn set_results(&self, value: T) -> Result<(), TaskError> {
        self.task.set_results(value)
    }

    pub fn set_finished(&self) {
        self.task.set_finished()
    }

    pub fn cancel(&self) {
        self.task.cancel()
    }

    /// Produces a non-master child whose cancellation is mutually coupled
    /// with `self`'s: cancelling either one cancels the other once it
    /// finishes (§5 — "cancellation propagates from child to parent only
    /// through `sub_operation` pairings, established by installing
    /// symmetric `finally` callbacks on each side").
    pub fn sub_operation(&self) -> SynchronousOperation<T> {
        let child = SynchronousOperation {
            task: TaskState::new(),
            future_taken: false,
            is_master: false,
        };
        let parent_task = Arc::clone(&self.task);
        let child_task = Arc::clone(&child.task);

        let parent_for_parent_continuation = Arc::clone(&parent_task);
        let child_for_parent_continuation = Arc::clone(&child_task);
        parent_task.add_continuation(false, move |_defer| {
            if parent_for_parent_continuation.is_cancelled() {
                child_for_parent_continuation.cancel();
            }
        });

        let child_for_child_continuation = Arc::clone(&child_task);
        let parent_for_child_continuation = Arc::clone(&parent_task);
        child_task.add_continuation(false, move |_defer| {
            if child_for_child_continuation.is_cancelled() {
                parent_for_child_continuation.cancel();
            }
        });

        child
    }
}

impl<T: Send + 'static> Default for SynchronousOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SynchronousOperation<T> {
    fn drop(&mut self) {
        // Only the master holder force-finishes an abandoned task; a
        // non-master child dropping early leaves that to its master.
        if self.is_master && !self.task.is_finished() {
            let _ = self.task.set_started();
            self.task.set_finished();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_unfinished_promise_finishes_and_cancels() {
        let promise = Promise::<i32>::new();
        promise.set_started().unwrap();
        let task = promise.task_arc();
        drop(promise);
        assert!(task.is_finished());
        assert!(task.is_cancelled());
    }

    #[test]
    fn future_called_twice_panics_in_debug() {
        let mut promise = Promise::<i32>::new();
        let _f1 = promise.future();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| promise.future()));
        assert!(result.is_err());
    }

    #[test]
    fn sub_operation_cancellation_is_mutual() {
        let mut parent = SynchronousOperation::<i32>::new();
        let mut child = parent.sub_operation();
        parent.set_started().unwrap();
        child.set_started().unwrap();

        let parent_task = parent.task_arc();
        let child_task = child.task_arc();

        parent.cancel();
        parent.set_finished();
        assert!(parent_task.is_cancelled());
        assert!(child_task.is_cancelled());

        let _ = child.future();
        let _ = parent.future();
    }
}
