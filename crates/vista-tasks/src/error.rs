//! Error kinds for the task framework.
//!
//! Grounded in the teacher crate's small hand-rolled error enums rather than
//! `anyhow`/`eyre`: the framework distinguishes exactly three kinds of
//! failure (§7), and callers frequently need to match on which kind they got
//! rather than just print a message.

use alloc::sync::Arc;
use core::fmt;

/// A producer error captured by [`crate::task`] and replayed to every later
/// reader.
///
/// Wraps `Arc<dyn Error + Send + Sync>` rather than `Box<dyn Error>` so that
/// the error can be cloned cheaply — both a [`crate::future::Future`] and any
/// [`crate::future::SharedFuture`]s spawned from the same
/// [`crate::promise::Promise`] may each need their own copy of it.
#[derive(Clone)]
pub struct CapturedError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl CapturedError {
    /// Captures `err` for later replay.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }
}

impl fmt::Debug for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for CapturedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// The three kinds of failure the framework ever reports (§7).
///
/// `Cancelled` is deliberately distinct from `Exception`: cancellation is a
/// terminal state, not a producer error, and callers that only care whether
/// they got a usable result can match on it separately.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum TaskError {
    /// The task was cancelled — either explicitly, or because the last
    /// [`crate::Dependency`] on it was dropped before it finished.
    Cancelled,
    /// The task's producer called `set_exception`/`capture_exception`, or a
    /// continuation's user function panicked.
    Exception(CapturedError),
    /// A caller violated the API contract: reading an unfinished task's
    /// result, setting a result twice, calling `future()` twice on the same
    /// promise, and similar programming errors (§7).
    ///
    /// In debug builds these are also asserted via `debug_assert!` at the
    /// call site so the bug is caught close to its source; this variant is
    /// the release-build fallback (the "diagnostic sink" of §7.1).
    ContractViolation(&'static str),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Cancelled => f.write_str("task was cancelled"),
            TaskError::Exception(e) => write!(f, "task failed: {e}"),
            TaskError::ContractViolation(msg) => write!(f, "task contract violation: {msg}"),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Exception(e) => Some(e),
            _ => None,
        }
    }
}

impl TaskError {
    /// True for [`TaskError::Cancelled`] — callers that only want to tell
    /// "nobody cared about this result" apart from "the producer failed"
    /// reach for this instead of a full `match`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}
