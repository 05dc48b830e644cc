use std::sync::Arc;
use std::time::Duration;

use vista_tasks::manager::{EventLoop, TaskManager, TaskManagerOptions};
use vista_tasks::test_stubs::{QueueEventLoop, ThreadWorkerPool};
use vista_tasks::{Promise, TaskId};

#[test]
fn worker_pool_task_runs_and_reports_success() {
    let manager = TaskManager::new(TaskManagerOptions::new().with_worker_pool(Arc::new(ThreadWorkerPool)));
    let mut future = manager.run_task_async::<i32, _>(|task| {
        task.set_started().unwrap();
        task.set_progress_maximum(1);
        task.set_progress_value(1);
        task.set_results(99).unwrap();
        task.set_finished();
    });

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(future.results().unwrap(), 99);
}

#[test]
fn ui_thread_wait_for_task_pumps_the_event_loop_until_finished() {
    let event_loop = Arc::new(QueueEventLoop::default());
    let manager = TaskManager::new(TaskManagerOptions::new().with_event_loop(Arc::clone(&event_loop) as Arc<dyn EventLoop>));

    let mut promise = Promise::<i32>::new();
    let task = promise.task_arc();
    manager.register_promise(&promise);

    let task_for_thread = Arc::clone(&task);
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        task_for_thread.set_started().unwrap();
        task_for_thread.set_results(1).unwrap();
        task_for_thread.set_finished();
    });
    // Keep posting no-op events so `wait_for_task`'s pump loop has something
    // to drain on every iteration until the task's own completion marks it
    // finished.
    for _ in 0..20 {
        event_loop.post(|| {});
    }

    assert!(manager.wait_for_task(&task, None));
    let _ = promise.future();
}

#[test]
fn cancel_all_and_wait_drains_the_live_list() {
    let manager = TaskManager::new(TaskManagerOptions::new().with_worker_pool(Arc::new(ThreadWorkerPool)));
    let _f1: vista_tasks::Future<i32> = manager.run_task_async(|task| {
        task.set_started().unwrap();
        while !task.is_cancelled() {
            std::thread::yield_now();
        }
        task.set_finished();
    });
    let _f2: vista_tasks::Future<i32> = manager.run_task_async(|task| {
        task.set_started().unwrap();
        task.set_results(1).unwrap();
        task.set_finished();
    });

    manager.cancel_all_and_wait();
    assert_eq!(manager.live_count(), 0);
}

#[test]
fn task_id_formats_as_task_hash_number() {
    let promise = Promise::<i32>::new();
    let id: TaskId = promise.task_arc().id();
    assert!(format!("{id}").starts_with("task#"));
}
