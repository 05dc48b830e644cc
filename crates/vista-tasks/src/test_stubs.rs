//! Minimal collaborator implementations used by this crate's own tests.
//!
//! Not a production event loop or thread pool (§6 forbids the core from
//! prescribing one) — `QueueEventLoop` has no timers or I/O integration and
//! `ThreadWorkerPool` spawns a bare `std::thread` per submission with no
//! reuse or back-pressure.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::manager::{EventLoop, WorkerPool};

/// A `VecDeque`-backed stand-in for a host UI event loop.
#[derive(Default)]
pub struct QueueEventLoop {
    queue: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
    processed: AtomicUsize,
}

impl QueueEventLoop {
    /// Posts a closure to be run on the next [`EventLoop::process_events`] call.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        self.queue.lock().push_back(Box::new(f));
    }

    /// Total closures run across every `process_events` call so far.
    pub fn processed_count(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }
}

impl EventLoop for QueueEventLoop {
    fn process_events(&self) {
        let batch: alloc::vec::Vec<_> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        let count = batch.len();
        for job in batch {
            job();
        }
        self.processed.fetch_add(count, Ordering::SeqCst);
        if count == 0 {
            std::thread::yield_now();
        }
    }
}

/// Spawns each submitted task on a plain `std::thread::spawn`.
pub struct ThreadWorkerPool;

impl WorkerPool for ThreadWorkerPool {
    fn submit(&self, runnable: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(runnable);
    }
}
