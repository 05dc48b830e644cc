use vista_tasks::executor::InlineExecutor;
use vista_tasks::{Promise, TaskError};

#[test]
fn dropping_the_last_future_cancels_an_unfinished_task() {
    let mut promise = Promise::<i32>::new();
    let future = promise.future();
    promise.set_started().unwrap();
    let task = promise.task_arc();

    drop(future);

    assert!(task.is_cancelled());
}

#[test]
fn cancelling_a_task_cancels_continuation_children_registered_through_map() {
    let mut promise = Promise::<i32>::new();
    let future = promise.future();
    let child = future.map(&InlineExecutor, false, |x| x + 1);

    promise.cancel();
    promise.set_finished();

    let mut child = child;
    assert!(matches!(child.results().unwrap_err(), TaskError::Cancelled));
}

#[test]
fn dropping_the_only_future_of_a_parent_cancels_a_chained_continuation() {
    let mut promise = Promise::<i32>::new();
    let future = promise.future();
    let child = future.map(&InlineExecutor, false, |x| x + 1);

    // Dropping the child future's only remaining strong dependency cancels
    // the continuation task, which in turn drops its held dependency on the
    // parent (§4.8 — cancelling a Continuation Task releases its parent).
    drop(child);
    promise.set_started().unwrap();
    promise.set_results(10).unwrap();
    promise.set_finished();

    assert!(promise.task_arc().is_finished());
}

#[test]
fn sub_operation_cancellation_propagates_both_ways() {
    use vista_tasks::promise::SynchronousOperation;

    let mut parent = SynchronousOperation::<i32>::new();
    let mut child = parent.sub_operation();
    parent.set_started().unwrap();
    child.set_started().unwrap();

    child.cancel();
    child.set_finished();
    parent.set_finished();

    assert!(parent.task_arc().is_cancelled());
    assert!(child.task_arc().is_cancelled());
    let _ = parent.future();
    let _ = child.future();
}
