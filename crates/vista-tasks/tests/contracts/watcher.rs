use vista_tasks::{Promise, TaskEvent, Watcher};

#[test]
fn watcher_receives_lifecycle_and_progress_events_in_order() {
    let mut promise = Promise::<i32>::new();
    let task = promise.task_arc();
    let mut watcher = Watcher::new();
    watcher.watch(task, false);

    promise.set_started().unwrap();
    promise.task_arc().set_progress_maximum(10);
    promise.task_arc().set_progress_value(10);
    promise.set_results(5).unwrap();
    promise.set_finished();

    let events = watcher.drain();
    let started_at = events.iter().position(|e| matches!(e, TaskEvent::Started));
    let finished_at = events.iter().position(|e| matches!(e, TaskEvent::Finished));
    assert!(started_at.is_some());
    assert!(finished_at.is_some());
    assert!(started_at.unwrap() < finished_at.unwrap());
}

#[test]
fn watching_an_already_finished_task_replays_its_terminal_state() {
    let promise = Promise::immediate(7);
    let task = promise.task_arc();
    let mut watcher = Watcher::new();
    watcher.watch(task, false);

    let events = watcher.drain();
    assert!(events.iter().any(|e| matches!(e, TaskEvent::Finished)));
}

#[test]
fn retargeting_with_pending_true_discards_events_from_the_old_target() {
    let first = Promise::<i32>::immediate(1);
    let second = Promise::<i32>::new();
    let mut watcher = Watcher::new();
    watcher.watch(first.task_arc(), false);
    watcher.watch(second.task_arc(), true);

    let events = watcher.drain();
    // Only the fresh second target's replayed (empty) lifecycle state
    // should remain queued — none of the first target's Finished event.
    assert!(!events.iter().any(|e| matches!(e, TaskEvent::Finished)));
}
