//! Task State (C1), Progress Extension (C2), and the Thread-Safe/Main-Thread
//! extensions (C3/C4), collapsed into one concrete type per the composition
//! note in §9/§4.11: a single [`TaskState<T>`] holds a mutex-guarded
//! [`Inner<T>`] plus an optional event-pump hook consulted before every
//! progress-reporting call. A plain worker task has no pump (C3 behaviour);
//! a main-thread task is constructed with one (C4 behaviour) — there is no
//! separate type for each.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use parking_lot::Mutex;

use crate::error::{CapturedError, TaskError};
use crate::progress::{ProgressEmit, ProgressState};
use crate::watcher::TaskEvent;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a task, used only for equality/logging — pointer
/// equality on the `Arc<TaskState<T>>` is the real identity (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// The host UI's event-pump hook, consulted by main-thread tasks (C4) on
/// every progress-reporting call so cancellation requests keep being
/// observed while a computation drives progress forward.
pub trait EventPump: Send + Sync {
    /// Pumps one batch of pending host events.
    fn pump(&self);
}

/// A tiny hand-rolled flag set — `Started`/`Finished`/`Cancelled` can be set
/// independently and simultaneously (§3), which rules out a plain enum.
/// Kept as three bits on a `u8` rather than pulling in a `bitflags`
/// dependency for this alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StateFlags(u8);

impl StateFlags {
    const STARTED: u8 = 0b001;
    const FINISHED: u8 = 0b010;
    const CANCELLED: u8 = 0b100;

    fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    fn insert(&mut self, bit: u8) {
        self.0 |= bit;
    }
}

/// One-shot callable registered via `add_continuation` (§4.1). The `bool`
/// is the `defer` flag the continuation was registered or replayed with.
pub(crate) type Continuation = Box<dyn FnOnce(bool) + Send>;

/// Dropped-dependency/cancellation hook installed by a Continuation Task
/// (§4.8) so that cancelling the child eagerly releases its hold on the
/// parent, instead of waiting for the child's `Arc` to be dropped.
pub(crate) type ContinuedTaskCanceller = Box<dyn FnOnce() + Send>;

pub(crate) struct Inner<T> {
    state: StateFlags,
    result: Option<T>,
    result_set: bool,
    exception: Option<CapturedError>,
    continuations: Vec<Continuation>,
    watchers: Vec<(u64, mpsc::Sender<TaskEvent>)>,
    next_watcher_id: u64,
    share_count: u64,
    progress: ProgressState,
    continued_task: Option<ContinuedTaskCanceller>,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Self {
            state: StateFlags::default(),
            result: None,
            result_set: false,
            exception: None,
            continuations: Vec::new(),
            watchers: Vec::new(),
            next_watcher_id: 1,
            share_count: 0,
            progress: ProgressState::default(),
            continued_task: None,
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // §7: "no error is ever silently dropped" — a cancelled task has
        // nothing to report, but a finished-with-exception task that no one
        // ever read from still deserves a trace.
        if let Some(e) = self.exception.take() {
            if !self.state.contains(StateFlags::CANCELLED) {
                tracing::warn!(target: "vista_tasks", error = %e, "task dropped with an unobserved exception");
            }
        }
    }
}

/// The shared state backing every handle in the framework (C1–C4).
///
/// Always held behind `Arc<TaskState<T>>`; `T` is the task's result type and
/// must be `Clone` for [`Self::results`] to hand out owned copies (see
/// `DESIGN.md` for why `Future`/`SharedFuture` both require `T: Clone`
/// instead of the original's move-once read).
pub struct TaskState<T> {
    id: TaskId,
    inner: Mutex<Inner<T>>,
    pump: Option<Arc<dyn EventPump>>,
}

impl<T> TaskState<T> {
    /// Creates a worker-thread task (C3): every mutating call is safe from
    /// any thread, serialized by the internal mutex.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            inner: Mutex::new(Inner::default()),
            pump: None,
        })
    }

    /// Creates a main-thread task (C4): identical behaviour, except every
    /// progress-reporting call first pumps `pump` so the host UI stays
    /// responsive. Must only be driven from the thread that owns `pump`.
    pub fn with_event_pump(pump: Arc<dyn EventPump>) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            inner: Mutex::new(Inner::default()),
            pump: Some(pump),
        })
    }

    /// This task's identity, stable for its lifetime.
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().state.contains(StateFlags::STARTED)
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().state.contains(StateFlags::FINISHED)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().state.contains(StateFlags::CANCELLED)
    }

    /// Adds `Started` if absent. Returns whether the flag transitioned;
    /// fails if the task is already `Finished` (§4.1).
    pub fn set_started(&self) -> Result<bool, TaskError> {
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::FINISHED) {
            return Err(TaskError::ContractViolation(
                "set_started called on a task that already finished",
            ));
        }
        if inner.state.contains(StateFlags::STARTED) {
            return Ok(false);
        }
        inner.state.insert(StateFlags::STARTED);
        self.notify_watchers_locked(&mut inner, TaskEvent::Started);
        Ok(true)
    }

    /// Marks `Finished`. No-op if already finished. Holds a strong
    /// reference to `self` for the duration of the call so that a
    /// continuation which drops the last external reference cannot tear
    /// down the state mid-drain (§4.1).
    pub fn set_finished(self: &Arc<Self>) {
        let _self_guard = Arc::clone(self);
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::FINISHED) {
            return;
        }
        debug_assert!(
            inner.state.contains(StateFlags::STARTED),
            "set_finished called before set_started on {}",
            self.id
        );
        inner.state.insert(StateFlags::FINISHED);
        let continuations = core::mem::take(&mut inner.continuations);
        self.notify_watchers_locked(&mut inner, TaskEvent::Finished);
        drop(inner);
        for continuation in continuations {
            continuation(false);
        }
    }

    /// Requests cancellation. No-op if already `Finished`/`Cancelled`. Does
    /// not itself add `Started` or `Finished` — callers needing terminal
    /// state (a dropped `Promise`, a cancelled Continuation Task) drive
    /// those explicitly (§4.1).
    pub fn cancel(&self) {
        let canceller = {
            let mut inner = self.inner.lock();
            if inner.state.contains(StateFlags::FINISHED) || inner.state.contains(StateFlags::CANCELLED) {
                return;
            }
            inner.continued_task.take()
        };
        if let Some(canceller) = canceller {
            canceller();
        }
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::FINISHED) || inner.state.contains(StateFlags::CANCELLED) {
            return;
        }
        inner.state.insert(StateFlags::CANCELLED);
        self.notify_watchers_locked(&mut inner, TaskEvent::Cancelled);
    }

    /// Stores a captured producer error. No-op once `Cancelled`/`Finished`.
    pub fn set_exception(&self, e: CapturedError) {
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::CANCELLED) || inner.state.contains(StateFlags::FINISHED) {
            return;
        }
        debug_assert!(inner.result.is_none(), "exception and result are mutually exclusive");
        inner.exception = Some(e);
    }

    /// Writes the result. Fails if a result was already written or the task
    /// already finished (§4.7's `set_results` precondition).
    pub fn set_results(&self, value: T) -> Result<(), TaskError> {
        let mut inner = self.inner.lock();
        if inner.result_set {
            return Err(TaskError::ContractViolation("set_results called twice on the same task"));
        }
        if inner.state.contains(StateFlags::FINISHED) {
            return Err(TaskError::ContractViolation("set_results called after Finished"));
        }
        debug_assert!(inner.exception.is_none(), "exception and result are mutually exclusive");
        inner.result = Some(value);
        inner.result_set = true;
        Ok(())
    }

    /// Runs `f` now if the task already finished, otherwise defers it until
    /// [`Self::set_finished`] drains the continuation list (§4.1).
    pub fn add_continuation(&self, defer: bool, f: impl FnOnce(bool) + Send + 'static) {
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::FINISHED) {
            drop(inner);
            f(defer);
        } else {
            inner.continuations.push(Box::new(f));
        }
    }

    /// Installs the hook [`Self::cancel`] fires before delegating to its
    /// base behaviour — used by Continuation Tasks to drop their hold on
    /// the parent as soon as they are cancelled (§4.8).
    pub(crate) fn set_continued_task_canceller(&self, canceller: ContinuedTaskCanceller) {
        self.inner.lock().continued_task = Some(canceller);
    }

    /// Takes and clears the continued-task canceller, if any.
    pub(crate) fn take_continued_task_canceller(&self) -> Option<ContinuedTaskCanceller> {
        self.inner.lock().continued_task.take()
    }

    pub(crate) fn register_watcher(&self, sender: mpsc::Sender<TaskEvent>) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_watcher_id;
        inner.next_watcher_id += 1;
        // Replaying lifecycle/progress state lets every watcher adopt a
        // uniform event-driven model regardless of when it attaches (§4.9).
        if inner.state.contains(StateFlags::STARTED) {
            let _ = sender.send(TaskEvent::Started);
        }
        let _ = sender.send(TaskEvent::ProgressRangeChanged(inner.progress.maximum()));
        let _ = sender.send(TaskEvent::ProgressValueChanged(inner.progress.value()));
        if let Some(text) = inner.progress.text() {
            let _ = sender.send(TaskEvent::ProgressTextChanged(text.to_string()));
        }
        if inner.state.contains(StateFlags::CANCELLED) {
            let _ = sender.send(TaskEvent::Cancelled);
        }
        if inner.state.contains(StateFlags::FINISHED) {
            let _ = sender.send(TaskEvent::Finished);
        }
        inner.watchers.push((id, sender));
        id
    }

    pub(crate) fn unregister_watcher(&self, id: u64) {
        self.inner.lock().watchers.retain(|(wid, _)| *wid != id);
    }

    fn notify_watchers_locked(&self, inner: &mut Inner<T>, event: TaskEvent) {
        inner.watchers.retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    pub fn increment_share_count(&self) {
        self.inner.lock().share_count += 1;
    }

    /// Decrements the dependency count; if it reaches zero on a task that
    /// has not finished, cancels it (§3 invariant 4, §4.5).
    pub fn decrement_share_count(&self) {
        let should_cancel = {
            let mut inner = self.inner.lock();
            inner.share_count = inner.share_count.saturating_sub(1);
            inner.share_count == 0 && !inner.state.contains(StateFlags::FINISHED)
        };
        if should_cancel {
            self.cancel();
        }
    }

    fn update_progress(&self, f: impl FnOnce(&mut ProgressState) -> Option<ProgressEmit>) {
        if let Some(pump) = &self.pump {
            pump.pump();
        }
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::CANCELLED) || inner.state.contains(StateFlags::FINISHED) {
            return;
        }
        if let Some(emit) = f(&mut inner.progress) {
            let event = match emit {
                ProgressEmit::RangeChanged(m) => TaskEvent::ProgressRangeChanged(m),
                ProgressEmit::ValueChanged(v) => TaskEvent::ProgressValueChanged(v),
            };
            self.notify_watchers_locked(&mut inner, event);
        }
    }

    pub fn set_progress_maximum(&self, m: u64) {
        self.update_progress(|p| p.set_maximum(m));
    }

    pub fn set_progress_value(&self, v: u64) {
        self.update_progress(|p| p.set_value(v));
    }

    pub fn increment_progress_value(&self, delta: u64) {
        self.update_progress(|p| p.increment_value(delta));
    }

    /// Returns `¬is_cancelled`, mirroring §4.2's `set_progress_value_intermittent`.
    pub fn set_progress_value_intermittent(&self, v: u64, update_every: u64) -> bool {
        self.update_progress(|p| p.set_value_intermittent(v, update_every));
        !self.is_cancelled()
    }

    pub fn set_progress_text(&self, text: impl Into<Cow<'static, str>>) {
        if let Some(pump) = &self.pump {
            pump.pump();
        }
        let text = text.into();
        let mut inner = self.inner.lock();
        if inner.state.contains(StateFlags::CANCELLED) || inner.state.contains(StateFlags::FINISHED) {
            return;
        }
        inner.progress.set_text(text.clone());
        self.notify_watchers_locked(&mut inner, TaskEvent::ProgressTextChanged(text.into_owned()));
    }

    pub fn begin_progress_sub_steps(&self, weights: &[f64]) -> Result<(), TaskError> {
        if let Some(pump) = &self.pump {
            pump.pump();
        }
        let mut inner = self.inner.lock();
        inner
            .progress
            .begin_sub_steps(weights)
            .map_err(TaskError::ContractViolation)?;
        self.notify_watchers_locked(&mut inner, TaskEvent::ProgressRangeChanged(0));
        Ok(())
    }

    pub fn next_progress_sub_step(&self) -> Result<(), TaskError> {
        let mut inner = self.inner.lock();
        inner.progress.next_sub_step().map_err(TaskError::ContractViolation)?;
        self.notify_watchers_locked(&mut inner, TaskEvent::ProgressRangeChanged(0));
        Ok(())
    }

    pub fn end_progress_sub_steps(&self) -> Result<(), TaskError> {
        let mut inner = self.inner.lock();
        inner.progress.end_sub_steps().map_err(TaskError::ContractViolation)?;
        self.notify_watchers_locked(&mut inner, TaskEvent::ProgressRangeChanged(0));
        Ok(())
    }

    pub fn total_progress_value(&self) -> u64 {
        self.inner.lock().progress.total().0
    }

    pub fn total_progress_maximum(&self) -> u64 {
        self.inner.lock().progress.total().1
    }
}

impl<T: Clone> TaskState<T> {
    /// Reads the result. Requires `Finished ∧ ¬Cancelled ∧ exception == ∅`
    /// (§3 invariant 6); re-raises a captured exception otherwise.
    pub fn results(&self) -> Result<T, TaskError> {
        let inner = self.inner.lock();
        if !inner.state.contains(StateFlags::FINISHED) {
            return Err(TaskError::ContractViolation("results() called before the task finished"));
        }
        if inner.state.contains(StateFlags::CANCELLED) {
            return Err(TaskError::Cancelled);
        }
        if let Some(e) = &inner.exception {
            return Err(TaskError::Exception(e.clone()));
        }
        inner
            .result
            .clone()
            .ok_or(TaskError::ContractViolation("task finished without a result"))
    }
}

/// Converts a caught panic payload into a [`CapturedError`] (the internal
/// use of the original's zero-argument `capture_exception()` idiom — see
/// `DESIGN.md`).
pub(crate) fn capture_panic(payload: Box<dyn Any + Send>) -> CapturedError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("continuation panicked with a non-string payload")
    };
    CapturedError::new(PanicError(message))
}

#[derive(Debug)]
struct PanicError(String);

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.0)
    }
}

impl std::error::Error for PanicError {}
