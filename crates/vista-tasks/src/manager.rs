//! Task Manager (C10): registers tasks, maintains a live-task list, and
//! lets a caller block until a task finishes while still pumping the host
//! UI's event loop.
//!
//! `register_task`/`run_task_async`/`wait_for_task` all need to hold tasks
//! of heterogeneous result types `T` in one registry. Grounded in the
//! teacher crate's recurring object-safe `*Object` companion to a generic
//! trait (see its `router`/`transport` dyn-erasure pattern): [`TaskObject`]
//! is the erased, object-safe view of a [`TaskState`] that the manager's
//! live list actually stores.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::sync::mpsc;

use parking_lot::{Condvar, Mutex};

use crate::future::Future;
use crate::promise::Promise;
use crate::sealed::Sealed;
use crate::task::{TaskId, TaskState};

/// The object-safe facet of a [`TaskState<T>`] the manager's registry needs:
/// identity, lifecycle queries, and cancellation. Sealed — only
/// [`TaskState`] implements it; a host application registers its own tasks
/// by constructing them through this crate's [`Promise`], never by
/// implementing this trait itself.
pub trait TaskObject: Sealed + Send + Sync {
    /// This task's identity.
    fn id(&self) -> TaskId;
    fn is_finished(&self) -> bool;
    fn is_cancelled(&self) -> bool;
    fn cancel(&self);
}

impl<T: Send + Sync + 'static> Sealed for TaskState<T> {}

impl<T: Send + Sync + 'static> TaskObject for TaskState<T> {
    fn id(&self) -> TaskId {
        TaskState::id(self)
    }

    fn is_finished(&self) -> bool {
        TaskState::is_finished(self)
    }

    fn is_cancelled(&self) -> bool {
        TaskState::is_cancelled(self)
    }

    fn cancel(&self) {
        TaskState::cancel(self)
    }
}

/// An opaque host event loop the manager posts into and drains during
/// [`TaskManager::process_events`] (§6). Left open for host applications to
/// implement, like [`crate::Executor`].
pub trait EventLoop: Send + Sync {
    /// Pumps one batch of pending host events.
    fn process_events(&self);
}

/// A worker pool the manager submits self-running tasks to (§6). Absent in
/// single-threaded builds — [`TaskManager::run_task_async`] then runs the
/// producer inline.
pub trait WorkerPool: Send + Sync {
    /// Runs `runnable` — typically on some background thread.
    fn submit(&self, runnable: Box<dyn FnOnce() + Send>);
}

/// A lifecycle signal emitted onto [`TaskManager`]'s event channel (§4.10).
#[derive(Debug, Clone, Copy)]
pub enum ManagerEvent {
    /// A registered task reached `Finished`.
    TaskFinished(TaskId),
}

/// Configuration for a [`TaskManager`], following the teacher crate's
/// `*Builder`-with-`Default` convention (`contract.rs`'s
/// `CallContextBuilder`) rather than environment variables or a config file
/// — there is nothing external to parse here.
#[derive(Default)]
pub struct TaskManagerOptions {
    event_loop: Option<Arc<dyn EventLoop>>,
    worker_pool: Option<Arc<dyn WorkerPool>>,
}

impl TaskManagerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the host event loop; its presence is what selects the
    /// UI-thread `wait_for_task` path over the worker-thread condvar path.
    pub fn with_event_loop(mut self, event_loop: Arc<dyn EventLoop>) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    pub fn with_worker_pool(mut self, worker_pool: Arc<dyn WorkerPool>) -> Self {
        self.worker_pool = Some(worker_pool);
        self
    }
}

/// Registry, scheduler bridge, and wait coordinator for tasks (C10).
pub struct TaskManager {
    live: Mutex<Vec<Arc<dyn TaskObject>>>,
    event_loop: Option<Arc<dyn EventLoop>>,
    worker_pool: Option<Arc<dyn WorkerPool>>,
    events_tx: mpsc::Sender<ManagerEvent>,
    events_rx: Mutex<mpsc::Receiver<ManagerEvent>>,
}

impl TaskManager {
    pub fn new(options: TaskManagerOptions) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel();
        Arc::new(Self {
            live: Mutex::new(Vec::new()),
            event_loop: options.event_loop,
            worker_pool: options.worker_pool,
            events_tx,
            events_rx: Mutex::new(events_rx),
        })
    }

    /// Attaches `task` to the live list; it is removed automatically, and a
    /// [`ManagerEvent::TaskFinished`] is emitted, once it reaches `Finished`
    /// (§4.10).
    ///
    /// A literal `task_started` signal is deliberately not duplicated here:
    /// every task already exposes that transition to its own
    /// [`crate::Watcher`]s (C9); the manager's registry is concerned with
    /// the live list and the blocking-wait path, not re-broadcasting events
    /// a caller can already observe per-task.
    pub fn register_task<T: Send + Sync + 'static>(self: &Arc<Self>, task: &Arc<TaskState<T>>) {
        let id = task.id();
        let erased: Arc<dyn TaskObject> = Arc::clone(task);
        self.live.lock().push(erased);

        let manager = Arc::clone(self);
        let events_tx = self.events_tx.clone();
        task.add_continuation(false, move |_defer| {
            manager.live.lock().retain(|t| t.id() != id);
            let _ = events_tx.send(ManagerEvent::TaskFinished(id));
        });
    }

    pub fn register_future<T: Send + Sync + 'static>(self: &Arc<Self>, future: &Future<T>) {
        if let Some(dependency) = future.peek_dependency() {
            self.register_task(dependency.task());
        }
    }

    pub fn register_promise<T: Send + Sync + 'static>(self: &Arc<Self>, promise: &Promise<T>) {
        self.register_task(promise.task_ref());
    }

    /// Registers then submits `f` to the worker pool, passing it the fresh
    /// task to drive; returns that task's future (§4.10). With no worker
    /// pool configured, runs `f` inline on the manager's own scheduler.
    pub fn run_task_async<T, F>(self: &Arc<Self>, f: F) -> Future<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&Arc<TaskState<T>>) + Send + 'static,
    {
        let mut promise = Promise::<T>::new();
        let future = promise.future();
        let task = promise.task_arc();
        self.register_task(&task);

        match &self.worker_pool {
            Some(pool) => {
                let task_for_pool = Arc::clone(&task);
                pool.submit(Box::new(move || {
                    // Keeping `promise` alive until the producer returns
                    // guarantees invariant 2 (finished-at-destruction) even
                    // if `f` panics or forgets to finish the task itself.
                    let _promise_guard = promise;
                    f(&task_for_pool);
                }));
            }
            None => {
                let _promise_guard = promise;
                f(&task);
            }
        }
        future
    }

    /// Blocks until `task` finishes. Returns `true` only if neither `task`
    /// nor `dependent` ended up cancelled (§4.10).
    pub fn wait_for_task<T: Send + Sync + 'static>(
        &self,
        task: &Arc<TaskState<T>>,
        dependent: Option<&Arc<TaskState<T>>>,
    ) -> bool {
        if let Some(event_loop) = &self.event_loop {
            while !task.is_finished() {
                event_loop.process_events();
            }
        } else {
            let pair = Arc::new((Mutex::new(false), Condvar::new()));
            let pair_for_continuation = Arc::clone(&pair);
            task.add_continuation(false, move |_defer| {
                let (lock, cvar) = &*pair_for_continuation;
                *lock.lock() = true;
                cvar.notify_all();
            });
            let (lock, cvar) = &*pair;
            let mut done = lock.lock();
            if !*done {
                cvar.wait_while(&mut done, |done| !*done);
            }
        }
        !task.is_cancelled() && dependent.map_or(true, |d| !d.is_cancelled())
    }

    /// Pumps one batch of pending host events if an event loop is
    /// configured; a no-op otherwise (§4.10).
    pub fn process_events(&self) {
        if let Some(event_loop) = &self.event_loop {
            event_loop.process_events();
        }
    }

    /// The next pending lifecycle signal, if any, without blocking.
    pub fn poll_event(&self) -> Option<ManagerEvent> {
        self.events_rx.lock().try_recv().ok()
    }

    pub fn cancel_all(&self) {
        for task in self.live.lock().iter() {
            task.cancel();
        }
    }

    pub fn cancel_all_and_wait(&self) {
        self.cancel_all();
        self.wait_for_all();
    }

    /// Blocks until every currently-registered task finishes, pumping the
    /// event loop meanwhile if one is configured.
    pub fn wait_for_all(&self) {
        loop {
            if self.live.lock().is_empty() {
                return;
            }
            if let Some(event_loop) = &self.event_loop {
                event_loop.process_events();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Number of tasks currently on the live list.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::{QueueEventLoop, ThreadWorkerPool};

    #[test]
    fn worker_thread_wait_returns_true_on_success() {
        let manager = TaskManager::new(TaskManagerOptions::new().with_worker_pool(Arc::new(ThreadWorkerPool)));
        let future = manager.run_task_async::<i32, _>(|task| {
            task.set_started().unwrap();
            task.set_results(5).unwrap();
            task.set_finished();
        });
        let task = future.peek_dependency().unwrap().task_arc();
        assert!(manager.wait_for_task(&task, None));
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn ui_thread_wait_pumps_event_loop() {
        let event_loop = Arc::new(QueueEventLoop::default());
        let manager = TaskManager::new(TaskManagerOptions::new().with_event_loop(Arc::clone(&event_loop) as Arc<dyn EventLoop>));
        let task = TaskState::<i32>::new();
        manager.register_task(&task);
        event_loop.post(|| {});
        let task_for_thread = Arc::clone(&task);
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            task_for_thread.set_started().unwrap();
            task_for_thread.set_results(1).unwrap();
            task_for_thread.set_finished();
        });
        assert!(manager.wait_for_task(&task, None));
        assert!(event_loop.processed_count() >= 1);
    }

    #[test]
    fn cancel_all_cancels_every_live_task() {
        let manager = TaskManager::new(TaskManagerOptions::new());
        let a = TaskState::<i32>::new();
        let b = TaskState::<i32>::new();
        manager.register_task(&a);
        manager.register_task(&b);
        manager.cancel_all();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
