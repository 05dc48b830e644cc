use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vista_tasks::executor::InlineExecutor;
use vista_tasks::{CapturedError, Promise, TaskError};

#[test]
fn immediate_value_resolves_without_a_producer() {
    let mut future = vista_tasks::Future::ready(42);
    assert!(future.is_finished());
    assert!(!future.is_cancelled());
    assert_eq!(future.results().unwrap(), 42);
}

#[test]
fn simple_chain_maps_and_chains_through_a_nested_future() {
    let executor = InlineExecutor;
    let mut future = vista_tasks::Future::ready(3)
        .map(&executor, false, |x: i32| x * 2)
        .then(&executor, false, |x| vista_tasks::Future::ready(x + 1));
    assert_eq!(future.results().unwrap(), 7);
}

#[test]
fn error_propagates_through_a_chain_without_running_later_stages() {
    let executor = InlineExecutor;
    let error = CapturedError::new(std::io::Error::new(std::io::ErrorKind::Other, "disk read failed"));
    let stage_two_ran = Arc::new(AtomicBool::new(false));
    let stage_two_ran_clone = Arc::clone(&stage_two_ran);
    let mut future = vista_tasks::Future::<i32>::failed(error)
        .map(&executor, false, |x: i32| x + 1)
        .map(&executor, false, move |x: i32| {
            stage_two_ran_clone.store(true, Ordering::SeqCst);
            x + 1
        });
    let err = future.results().unwrap_err();
    assert!(matches!(err, TaskError::Exception(_)));
    assert!(!stage_two_ran.load(Ordering::SeqCst));
}

#[test]
fn sub_step_progress_matches_the_weighted_projection() {
    let mut promise = Promise::<()>::new();
    let future = promise.future();
    let task = promise.task_arc();

    task.begin_progress_sub_steps(&[1.0, 3.0]).unwrap();
    task.set_progress_maximum(10);
    task.set_progress_value(5);
    assert_eq!(task.total_progress_value(), 125);
    assert_eq!(task.total_progress_maximum(), 1000);

    task.next_progress_sub_step().unwrap();
    task.set_progress_value(0);
    assert_eq!(task.total_progress_value(), 250);

    task.end_progress_sub_steps().unwrap();
    promise.set_started().unwrap();
    promise.set_results(()).unwrap();
    promise.set_finished();

    let mut future = future;
    assert!(future.results().is_ok());
}

#[test]
fn then_task_lets_the_producer_report_progress_on_the_child() {
    let executor = InlineExecutor;
    let mut future = vista_tasks::Future::ready(4).then_task(&executor, |value, child| {
        child.set_progress_maximum(1);
        child.set_progress_value(1);
        value * 10
    });
    assert_eq!(future.results().unwrap(), 40);
}
