//! Redelivered and reordered messages change nothing twice.

use std::sync::Arc;

use runkeeper::{ListParams, QueueConsumer, RunJobMessage};
use serde_json::json;

use crate::common::*;

fn enqueue(h: &Harness, message: RunJobMessage) {
    h.db
        .transaction(|txn| txn.enqueue(message.to_payload()?))
        .unwrap();
}

#[test]
fn stale_execute_after_completion_is_noop() {
    let h = Harness::new();
    let model = Arc::new(ScriptedModelClient::replying("Hello"));
    let worker = h.worker(Arc::clone(&model));
    let run = h.queue_run();
    QueueConsumer::drain(&worker).unwrap();
    let before = h.db.current_version();

    enqueue(&h, RunJobMessage::execute(run.id.clone()));
    enqueue(&h, RunJobMessage::execute(run.id.clone()));
    let after_enqueue = h.db.current_version();
    assert_eq!(QueueConsumer::drain(&worker).unwrap(), 2);

    assert_eq!(h.db.current_version(), after_enqueue);
    assert!(after_enqueue > before);
    assert_eq!(model.calls(), 1);
    assert_eq!(h.replies().len(), 1);
    let steps = h.records.list_steps(&run.id, &ListParams::new()).unwrap();
    assert_eq!(steps.data.len(), 1);
}

#[test]
fn duplicate_execute_in_queue_runs_once() {
    let h = Harness::new();
    let model = Arc::new(ScriptedModelClient::replying("Hello"));
    let worker = h.worker(Arc::clone(&model));
    let run = h.queue_run();
    enqueue(&h, RunJobMessage::execute(run.id.clone()));

    assert_eq!(QueueConsumer::drain(&worker).unwrap(), 2);
    assert_eq!(model.calls(), 1);
    assert_eq!(h.run(&run.id).status, RunStatus::Completed);
}

#[test]
fn cancel_on_queued_run_leaves_it_unchanged() {
    let h = Harness::new();
    let worker = h.worker(Arc::new(ScriptedModelClient::replying("x")));
    let run = h.queue_run();
    let before = h.run(&run.id);

    assert_eq!(
        worker.handle(&RunJobMessage::cancel(run.id.clone())).unwrap(),
        Outcome::Skipped(SkipReason::StatusMismatch(RunStatus::Queued))
    );
    assert_eq!(h.run(&run.id), before);
}

#[test]
fn repeated_cancel_and_late_expire_are_noops() {
    let h = Harness::new();
    let worker = h.worker(Arc::new(ScriptedModelClient::replying("x")));
    let run = h.queue_run();
    h.dispatcher.request_cancel(&run.id).unwrap();
    worker.cancel(&run.id).unwrap();
    let settled = h.run(&run.id);

    assert_eq!(
        worker.cancel(&run.id).unwrap(),
        Outcome::Skipped(SkipReason::StatusMismatch(RunStatus::Cancelled))
    );
    assert_eq!(
        worker.expire(&run.id).unwrap(),
        Outcome::Skipped(SkipReason::StatusMismatch(RunStatus::Cancelled))
    );
    assert_eq!(h.run(&run.id), settled);
}

#[test]
fn unknown_action_and_garbage_are_acked() {
    let h = Harness::new();
    let worker = h.worker(Arc::new(ScriptedModelClient::replying("x")));
    h.db
        .transaction(|txn| {
            txn.enqueue(json!({"action": "archive", "runId": "run_1"}))?;
            txn.enqueue(json!([1, 2, 3]))
        })
        .unwrap();

    assert_eq!(QueueConsumer::drain(&worker).unwrap(), 2);
    assert_eq!(h.db.pending(), 0);
    assert!(h.db.dead_letters().is_empty());
}

#[test]
fn messages_for_missing_runs_are_dropped() {
    let h = Harness::new();
    let worker = h.worker(Arc::new(ScriptedModelClient::replying("x")));
    let ghost = RunId::from("run_ghost");
    enqueue(&h, RunJobMessage::execute(ghost.clone()));
    enqueue(&h, RunJobMessage::cancel(ghost.clone()));
    enqueue(&h, RunJobMessage::expire(ghost));

    assert_eq!(QueueConsumer::drain(&worker).unwrap(), 3);
    assert!(h.db.dead_letters().is_empty());
}
