//! Future / SharedFuture (C6): the read-side handles.
//!
//! `Future<T>` is move-only and consumes its result once; `SharedFuture<T>`
//! is copyable and may be read any number of times. Both wrap a single
//! [`crate::Dependency`] and both require `T: Clone` — see `DESIGN.md` for
//! why this departs from the original's borrow-returning `SharedFuture` and
//! move-consuming `Future`: a mutex-guarded result slot cannot hand out a
//! borrow that outlives the lock, and the precedent for this exact
//! constraint is `futures::future::Shared<Fut>`, which requires
//! `Fut::Output: Clone` for the same reason.
//!
//! `then`/`then_task`/`finally`/`on_error`/`map` live in [`crate::continuation`]
//! rather than here, since they all construct a [`crate::task::TaskState`]
//! and wire it up as described in §4.8.

use crate::dependency::Dependency;
use crate::error::TaskError;
use crate::task::TaskState;

/// Move-only read-side handle produced by a [`crate::promise::Promise`] or a
/// `then`-family call. Reading the result consumes it (§4.6).
pub struct Future<T> {
    dependency: Option<Dependency<T>>,
}

impl<T> Future<T> {
    pub(crate) fn from_dependency(dependency: Dependency<T>) -> Self {
        Self {
            dependency: Some(dependency),
        }
    }

    /// Takes the dependency out, invalidating this future. Used by the
    /// `then`-family to move the handle into a Continuation Task.
    pub(crate) fn take_dependency(&mut self) -> Option<Dependency<T>> {
        self.dependency.take()
    }

    pub(crate) fn peek_dependency(&self) -> Option<&Dependency<T>> {
        self.dependency.as_ref()
    }

    /// False once this future's result has been read or moved elsewhere.
    pub fn is_valid(&self) -> bool {
        self.dependency.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.dependency.as_ref().is_some_and(|d| d.task().is_finished())
    }

    pub fn is_cancelled(&self) -> bool {
        self.dependency.as_ref().is_some_and(|d| d.task().is_cancelled())
    }
}

impl<T: Clone> Future<T> {
    /// Reads and consumes the result. Requires `is_valid ∧ is_finished ∧
    /// ¬is_cancelled`; re-raises a captured exception (§4.6).
    pub fn results(&mut self) -> Result<T, TaskError> {
        let dependency = self
            .dependency
            .take()
            .ok_or(TaskError::ContractViolation("results() called on an invalid Future"))?;
        dependency.task().results()
    }
}

impl<T: Send + 'static> Future<T> {
    /// An already-finished future carrying `value`.
    pub fn ready(value: T) -> Self {
        let task = TaskState::new();
        task.set_started().expect("fresh task cannot already be finished");
        task.set_results(value).expect("fresh task cannot already hold a result");
        task.set_finished();
        Self::from_dependency(Dependency::new(task))
    }

    /// An already-finished future carrying `error`.
    pub fn failed(error: crate::error::CapturedError) -> Self {
        let task = TaskState::new();
        task.set_started().expect("fresh task cannot already be finished");
        task.set_exception(error);
        task.set_finished();
        Self::from_dependency(Dependency::new(task))
    }

    /// An already-cancelled future.
    pub fn cancelled() -> Self {
        let task = TaskState::new();
        task.cancel();
        let _ = task.set_started();
        task.set_finished();
        Self::from_dependency(Dependency::new(task))
    }
}

/// Copyable read-side handle. Unlike [`Future`], reading a result does not
/// invalidate it (§4.6).
pub struct SharedFuture<T> {
    dependency: Dependency<T>,
}

impl<T> SharedFuture<T> {
    pub(crate) fn from_dependency(dependency: Dependency<T>) -> Self {
        Self { dependency }
    }

    pub(crate) fn dependency(&self) -> &Dependency<T> {
        &self.dependency
    }

    pub fn is_finished(&self) -> bool {
        self.dependency.task().is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.dependency.task().is_cancelled()
    }
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
        }
    }
}

impl<T: Clone> SharedFuture<T> {
    /// Reads the result without invalidating `self` (§4.6).
    pub fn result(&self) -> Result<T, TaskError> {
        self.dependency.task().results()
    }

    /// Tuple-shaped alias for [`Self::result`], matching the original's
    /// `results()` naming for multi-value tasks.
    pub fn results(&self) -> Result<T, TaskError> {
        self.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_future_round_trips() {
        let mut f = Future::ready(7);
        assert!(f.is_finished());
        assert!(!f.is_cancelled());
        assert_eq!(f.results().unwrap(), 7);
        assert!(!f.is_valid());
    }

    #[test]
    fn failed_future_reraises_error() {
        let mut f = Future::<i32>::failed(crate::error::CapturedError::new(
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        ));
        let err = f.results().unwrap_err();
        assert!(matches!(err, TaskError::Exception(_)));
    }

    #[test]
    fn cancelled_future_reports_cancelled() {
        let mut f = Future::<i32>::cancelled();
        assert!(f.is_cancelled());
        assert!(matches!(f.results().unwrap_err(), TaskError::Cancelled));
    }

    #[test]
    fn shared_future_can_be_read_repeatedly() {
        let task = TaskState::<i32>::new();
        task.set_started().unwrap();
        task.set_results(42).unwrap();
        task.set_finished();
        let shared = SharedFuture::from_dependency(Dependency::new(task));
        assert_eq!(shared.result().unwrap(), 42);
        assert_eq!(shared.result().unwrap(), 42);
        let _clone = shared.clone();
    }
}
