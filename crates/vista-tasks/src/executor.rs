//! The Executor collaborator interface (§6, §9): an object that redirects a
//! continuation callable to a chosen execution context.
//!
//! Grounded in the teacher crate's `TaskExecutor`/`AsyncRuntime` pattern of
//! exposing a small sealed trait for "a thing that runs work somewhere" —
//! `vista-tasks`' version is synchronous (the original's `create_work`
//! wraps a plain callable, not an `async fn`), so it carries no
//! `async-trait` dependency.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::manager::TaskManager;

/// A continuation callable, as installed via `add_continuation` (§4.1): takes
/// the `defer` flag it was scheduled with.
pub type Work = Box<dyn FnOnce(bool) + Send>;

/// Wraps a continuation callable so it runs in a chosen context (inline,
/// main-thread, worker) instead of synchronously on the thread that
/// completed its parent task (§6).
///
/// Unlike [`crate::task::TaskState`]'s internal dyn-erasure trait, this one
/// is deliberately left open for host applications to implement — §6 says
/// the core "exposes, but does not define" this collaborator interface.
pub trait Executor: Send + Sync {
    /// Wraps `f` into a callable that, when invoked, runs `f` in this
    /// executor's context.
    fn create_work(&self, f: Work) -> Work;

    /// The manager `then` should register spawned Continuation Tasks with,
    /// if this executor is associated with one.
    fn task_manager(&self) -> Option<Arc<TaskManager>> {
        None
    }
}

/// Runs work unchanged, synchronously, on whatever thread invokes it — the
/// minimal legal executor (§6).
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn create_work(&self, f: Work) -> Work {
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_executor_runs_work_unchanged() {
        let executor = InlineExecutor;
        let ran = Arc::new(core::sync::atomic::AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let work = executor.create_work(Box::new(move |_defer| {
            ran_clone.store(true, core::sync::atomic::Ordering::SeqCst);
        }));
        work(false);
        assert!(ran.load(core::sync::atomic::Ordering::SeqCst));
    }
}
