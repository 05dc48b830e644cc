//! Continuation Task (C8): the machinery behind `then`/`then_task`/`finally`/
//! `on_error`, implemented as inherent methods on [`Future`]/[`SharedFuture`].
//!
//! §4.8 describes `fulfill_with` as three overloads dispatched on the user
//! function's return type (`void`, a value `T`, or `Future<T>`). Rust has no
//! return-type specialization on stable, so — following the same split the
//! `futures` crate makes for exactly this reason — this module exposes
//! [`Future::map`] (`void`/value-returning, merged since `void` is just
//! `U = ()`) and [`Future::then`] (future-returning/chaining) as distinct
//! methods instead of one overloaded `then`. See `DESIGN.md`.

use alloc::boxed::Box;
use alloc::sync::Arc;
use std::panic::{self, AssertUnwindSafe};

use crate::dependency::Dependency;
use crate::error::{CapturedError, TaskError};
use crate::executor::{Executor, Work};
use crate::future::{Future, SharedFuture};
use crate::promise::Promise;
use crate::task::{capture_panic, TaskState};

/// Installs `parent_dependency` as the child's held reference to its
/// parent and builds the continuation that fires when the parent finishes.
/// Shared by every `then`-family method; `on_result` receives the parent's
/// outcome (`Ok(value)` / cancelled / exception) and the child task to
/// drive, and is responsible for calling `set_finished` unless it is
/// deliberately deferring completion (the `then` chaining case).
fn install_continuation<T, U>(
    parent_dependency: Dependency<T>,
    executor: &dyn Executor,
    install_defer: bool,
    on_result: impl FnOnce(Result<T, TaskError>, &Arc<TaskState<U>>) + Send + 'static,
) -> Future<U>
where
    T: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    let parent_task = parent_dependency.task_arc();
    let child_task = TaskState::<U>::new();
    let mut child_promise = Promise::from_task(Arc::clone(&child_task));
    let child_future = child_promise.future();

    child_task.set_continued_task_canceller(Box::new(move || drop(parent_dependency)));

    let child_for_continuation = Arc::clone(&child_task);
    let parent_for_continuation = Arc::clone(&parent_task);
    let work: Work = Box::new(move |_defer| {
        // Keeps the child's Promise alive through this call so a forgotten
        // `set_finished` in `on_result` still satisfies invariant 2; harmless
        // once `on_result` already finished the child (the common case).
        let _promise_guard = child_promise;

        let had_parent_dependency = child_for_continuation.take_continued_task_canceller().is_some();
        if child_for_continuation.is_cancelled() || !had_parent_dependency || parent_for_continuation.is_cancelled() {
            let _ = child_for_continuation.set_started();
            child_for_continuation.cancel();
            child_for_continuation.set_finished();
            return;
        }

        let outcome = parent_for_continuation.results();
        let _ = child_for_continuation.set_started();
        on_result(outcome, &child_for_continuation);
    });
    let work = executor.create_work(work);

    parent_task.add_continuation(install_defer, move |defer| work(defer));
    child_future
}

impl<T: Clone + Send + Sync + 'static> Future<T> {
    /// Maps a finished value through `f`, producing a new `Future<U>`. `f`
    /// is never invoked if `self` finished cancelled or with an exception —
    /// the failure is forwarded to the returned future instead (§4.8's
    /// `void`/value-returning `fulfill_with` overloads).
    pub fn map<U>(
        mut self,
        executor: &dyn Executor,
        defer: bool,
        f: impl FnOnce(T) -> U + Send + 'static,
    ) -> Future<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let Some(dependency) = self.take_dependency() else {
            return Future::cancelled();
        };
        install_continuation(dependency, executor, defer, move |outcome, child| {
            match outcome {
                Ok(value) => match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(result) => {
                        let _ = child.set_results(result);
                    }
                    Err(payload) => child.set_exception(capture_panic(payload)),
                },
                Err(TaskError::Cancelled) => child.cancel(),
                Err(TaskError::Exception(e)) => child.set_exception(e),
                Err(TaskError::ContractViolation(msg)) => {
                    child.set_exception(CapturedError::new(ContractViolationError(msg)))
                }
            }
            child.set_finished();
        })
    }

    /// Like [`Self::map`], but `f` also receives the child task itself, so a
    /// producer that wants to report progress through the returned future
    /// can do so before returning its value (§4.8's `then_task`).
    pub fn then_task<U>(
        mut self,
        executor: &dyn Executor,
        f: impl FnOnce(T, &Arc<TaskState<U>>) -> U + Send + 'static,
    ) -> Future<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let Some(dependency) = self.take_dependency() else {
            return Future::cancelled();
        };
        install_continuation(dependency, executor, false, move |outcome, child| {
            match outcome {
                Ok(value) => {
                    let child_for_panic = Arc::clone(child);
                    match panic::catch_unwind(AssertUnwindSafe(|| f(value, &child_for_panic))) {
                        Ok(result) => {
                            let _ = child.set_results(result);
                        }
                        Err(payload) => child.set_exception(capture_panic(payload)),
                    }
                }
                Err(TaskError::Cancelled) => child.cancel(),
                Err(TaskError::Exception(e)) => child.set_exception(e),
                Err(TaskError::ContractViolation(msg)) => {
                    child.set_exception(CapturedError::new(ContractViolationError(msg)))
                }
            }
            child.set_finished();
        })
    }

    /// Chains onto a future-returning continuation (§4.8's `Future<T>`
    /// `fulfill_with` overload): the child remains unfinished until the
    /// nested future completes, then adopts its terminal state.
    pub fn then<U>(
        mut self,
        executor: &dyn Executor,
        defer: bool,
        f: impl FnOnce(T) -> Future<U> + Send + 'static,
    ) -> Future<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let Some(dependency) = self.take_dependency() else {
            return Future::cancelled();
        };
        install_continuation(dependency, executor, defer, move |outcome, child| {
            let nested = match outcome {
                Ok(value) => match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(nested) => nested,
                    Err(payload) => {
                        child.set_exception(capture_panic(payload));
                        child.set_finished();
                        return;
                    }
                },
                Err(TaskError::Cancelled) => {
                    child.cancel();
                    child.set_finished();
                    return;
                }
                Err(TaskError::Exception(e)) => {
                    child.set_exception(e);
                    child.set_finished();
                    return;
                }
                Err(TaskError::ContractViolation(msg)) => {
                    child.set_exception(CapturedError::new(ContractViolationError(msg)));
                    child.set_finished();
                    return;
                }
            };
            forward_nested(nested, Arc::clone(child));
        })
    }

    /// Registers a continuation that always runs once `self` finishes,
    /// including on cancellation or error, and does not produce a new
    /// future (§4.8). Consumes `self`, keeping its dependency alive in the
    /// continuation closure so the last-future-drop auto-cancel rule (§5)
    /// does not fire out from under the pending callback.
    pub fn finally(mut self, executor: &dyn Executor, defer: bool, f: impl FnOnce(Result<T, TaskError>) + Send + 'static) {
        let Some(dependency) = self.take_dependency() else {
            return;
        };
        let task = dependency.task_arc();
        let task_for_continuation = Arc::clone(&task);
        let work: Work = Box::new(move |_defer| {
            let _dependency_guard = dependency;
            f(task_for_continuation.results());
        });
        let work = executor.create_work(work);
        task.add_continuation(defer, move |defer| work(defer));
    }

    /// Registers a continuation that runs only when `self` finishes with an
    /// exception (not on success, not on cancellation).
    pub fn on_error(self, executor: &dyn Executor, f: impl FnOnce(&TaskError) + Send + 'static) {
        self.finally(executor, false, move |outcome| {
            if let Err(e) = outcome {
                if !e.is_cancelled() {
                    f(&e);
                }
            }
        });
    }
}

fn forward_nested<U: Clone + Send + Sync + 'static>(mut nested: Future<U>, child: Arc<TaskState<U>>) {
    let Some(nested_dependency) = nested.take_dependency() else {
        child.cancel();
        child.set_finished();
        return;
    };
    let nested_task = nested_dependency.task_arc();
    let nested_task_for_continuation = Arc::clone(&nested_task);
    nested_task.add_continuation(false, move |_defer| {
        let _nested_dependency_guard = nested_dependency;
        match nested_task_for_continuation.results() {
            Ok(value) => {
                let _ = child.set_results(value);
            }
            Err(TaskError::Cancelled) => child.cancel(),
            Err(TaskError::Exception(e)) => child.set_exception(e),
            Err(TaskError::ContractViolation(msg)) => {
                child.set_exception(CapturedError::new(ContractViolationError(msg)))
            }
        }
        child.set_finished();
    });
}

impl<T: Clone + Send + Sync + 'static> SharedFuture<T> {
    /// Like [`Future::map`], but does not invalidate `self` (§4.6).
    pub fn map<U>(&self, executor: &dyn Executor, defer: bool, f: impl FnOnce(T) -> U + Send + 'static) -> Future<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        Future::from_dependency(self.dependency().clone()).map(executor, defer, f)
    }

    /// Registers a continuation that always runs, extending the task's
    /// lifetime with a strong reference taken from `self` so it runs even
    /// if every `SharedFuture` copy is dropped first (§4.6's `force_then`).
    pub fn force_then(&self, executor: &dyn Executor, f: impl FnOnce(Result<T, TaskError>) + Send + 'static) {
        Future::from_dependency(self.dependency().clone()).finally(executor, false, f);
    }
}

#[derive(Debug)]
struct ContractViolationError(&'static str);

impl core::fmt::Display for ContractViolationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "contract violation: {}", self.0)
    }
}

impl std::error::Error for ContractViolationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;

    #[test]
    fn simple_chain_matches_scenario_2() {
        let f = Future::ready(3)
            .map(&InlineExecutor, false, |x: i32| x * x)
            .map(&InlineExecutor, false, |y: i32| y + 1);
        let mut f = f;
        assert_eq!(f.results().unwrap(), 10);
    }

    #[test]
    fn error_propagates_without_invoking_map_fn() {
        let error = CapturedError::new(ContractViolationError("boom"));
        let invoked = Arc::new(core::sync::atomic::AtomicBool::new(false));
        let invoked_clone = Arc::clone(&invoked);
        let mut f = Future::<i32>::failed(error).map(&InlineExecutor, false, move |x| {
            invoked_clone.store(true, core::sync::atomic::Ordering::SeqCst);
            x + 1
        });
        assert!(matches!(f.results().unwrap_err(), TaskError::Exception(_)));
        assert!(!invoked.load(core::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn cancelling_parent_before_continuation_skips_user_fn() {
        let mut promise = Promise::<i32>::new();
        let future = promise.future();
        let invoked = Arc::new(core::sync::atomic::AtomicBool::new(false));
        let invoked_clone = Arc::clone(&invoked);
        let mut child = future.map(&InlineExecutor, false, move |x: i32| {
            invoked_clone.store(true, core::sync::atomic::Ordering::SeqCst);
            x
        });
        promise.cancel();
        promise.set_finished();
        assert!(child.is_cancelled());
        assert!(matches!(child.results().unwrap_err(), TaskError::Cancelled));
        assert!(!invoked.load(core::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn then_chains_a_nested_future() {
        let mut f = Future::ready(3).then(&InlineExecutor, false, |x: i32| Future::ready(x + 10));
        assert_eq!(f.results().unwrap(), 13);
    }

    #[test]
    fn finally_runs_on_success_and_on_error() {
        let success_seen = Arc::new(core::sync::atomic::AtomicBool::new(false));
        let seen_clone = Arc::clone(&success_seen);
        Future::ready(1).finally(&InlineExecutor, false, move |result| {
            seen_clone.store(result.is_ok(), core::sync::atomic::Ordering::SeqCst);
        });
        assert!(success_seen.load(core::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn on_error_skips_success_and_cancellation() {
        let calls = Arc::new(core::sync::atomic::AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        Future::ready(1).on_error(&InlineExecutor, move |_| {
            calls_clone.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
        });
        let calls_clone2 = Arc::clone(&calls);
        Future::<i32>::cancelled().on_error(&InlineExecutor, move |_| {
            calls_clone2.fetch_add(1, core::sync::atomic::Ordering::SeqCst);
        });
        assert_eq!(calls.load(core::sync::atomic::Ordering::SeqCst), 0);
    }
}
