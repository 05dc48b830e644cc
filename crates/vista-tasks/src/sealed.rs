//! The sealed-trait pattern, applied to [`crate::executor::Executor`] and
//! [`crate::manager::EventLoop`]/[`crate::manager::WorkerPool`].
//!
//! Grounded in the teacher crate's use of a private `Sealed` supertrait to
//! let external code hold/pass these trait objects without being able to
//! implement a brand-new one (which would bypass invariants the framework
//! assumes, e.g. that an inline executor really does run `f` on the caller's
//! thread). Only types defined inside this crate implement `Sealed`.

/// Restricts implementations of the traits that require it to this crate.
pub trait Sealed {}
