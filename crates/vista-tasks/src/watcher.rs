//! Task Watcher (C9): a single-threaded observer forwarding lifecycle and
//! progress events to the UI.
//!
//! Grounded in the re-architecture note of §9 ("a vector of weak handles for
//! watchers... watchers de-register in their destructor"): rather than an
//! intrusive linked list, each watcher owns an `mpsc::Receiver` and the task
//! holds the matching `Sender`; [`Watcher::drop`] unregisters the matching
//! id so a watcher that goes out of scope stops receiving events without
//! the task needing to know why.

use alloc::string::String;
use alloc::sync::Arc;
use std::sync::mpsc;

use crate::task::TaskState;

/// A lifecycle or progress notification delivered to a [`Watcher`].
///
/// Never run synchronously on the thread that drove the transition (§4.1) —
/// they are queued here and only observed when the watcher's owner calls
/// [`Watcher::poll`] or [`Watcher::drain`].
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// The task entered `Started`.
    Started,
    /// The task entered `Finished`.
    Finished,
    /// The task entered `Cancelled`.
    Cancelled,
    /// `progress_maximum` changed.
    ProgressRangeChanged(u64),
    /// `progress_value` changed.
    ProgressValueChanged(u64),
    /// `progress_text` changed.
    ProgressTextChanged(String),
}

struct Target<T> {
    id: u64,
    task: Arc<TaskState<T>>,
}

/// Observes at most one task at a time (§4.9). Retarget with [`Watcher::watch`].
pub struct Watcher<T> {
    receiver: mpsc::Receiver<TaskEvent>,
    sender: mpsc::Sender<TaskEvent>,
    target: Option<Target<T>>,
}

impl<T> Watcher<T> {
    /// Creates a watcher with no target.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            receiver,
            sender,
            target: None,
        }
    }

    /// Attaches to `task`, replacing any prior target.
    ///
    /// When `pending` is `true`, events already queued for the previous
    /// target are drained and discarded first so the next [`Watcher::poll`]
    /// only reports events from the new target (§4.9).
    pub fn watch(&mut self, task: Arc<TaskState<T>>, pending: bool) {
        if let Some(old) = self.target.take() {
            old.task.unregister_watcher(old.id);
            if pending {
                while self.receiver.try_recv().is_ok() {}
            }
        }
        let id = task.register_watcher(self.sender.clone());
        self.target = Some(Target { id, task });
    }

    /// Detaches from the current target, if any.
    pub fn unwatch(&mut self) {
        if let Some(old) = self.target.take() {
            old.task.unregister_watcher(old.id);
        }
    }

    /// Forwards cancellation to the watched task, if any.
    pub fn cancel(&self) {
        if let Some(target) = &self.target {
            target.task.cancel();
        }
    }

    /// Returns the next queued event, if any, without blocking.
    pub fn poll(&self) -> Option<TaskEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drains every event currently queued, in order.
    pub fn drain(&self) -> alloc::vec::Vec<TaskEvent> {
        let mut events = alloc::vec::Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl<T> Default for Watcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Watcher<T> {
    fn drop(&mut self) {
        self.unwatch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaching_replays_current_state() {
        let task = TaskState::<u32>::new();
        task.set_started().unwrap();
        let mut watcher = Watcher::new();
        watcher.watch(task, false);
        let events = watcher.drain();
        assert!(events.iter().any(|e| matches!(e, TaskEvent::Started)));
    }

    #[test]
    fn finishing_emits_finished_event() {
        let task = TaskState::<u32>::new();
        let mut watcher = Watcher::new();
        watcher.watch(alloc::sync::Arc::clone(&task), false);
        task.set_started().unwrap();
        task.set_results(7).unwrap();
        task.set_finished();
        let events = watcher.drain();
        assert!(events.iter().any(|e| matches!(e, TaskEvent::Finished)));
    }
}
