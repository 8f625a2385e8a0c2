//! End-to-end lifecycles driven through the queue.

use std::sync::Arc;

use runkeeper::{LastErrorCode, ModelError, QueueConsumer};

use crate::common::*;

#[test]
fn execute_reply_completes_run_with_message_step() {
    let h = Harness::with_thread_id("thrd-1");
    let run = h
        .dispatcher
        .create_with_id(RunId::from("run-1"), &h.thread.id, h.request())
        .unwrap();
    assert_eq!(run.status, RunStatus::Queued);

    let worker = h.worker(Arc::new(ScriptedModelClient::replying("Hello")));
    assert_eq!(QueueConsumer::drain(&worker).unwrap(), 1);

    let run = h.run(&RunId::from("run-1"));
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.thread_id, ThreadId::from("thrd-1"));

    let steps = h.records.list_steps(&run.id, &Default::default()).unwrap();
    assert_eq!(steps.data.len(), 1);
    let step = &steps.data[0];
    assert_eq!(step.status, StepStatus::Completed);

    let message_id = step
        .step_details
        .message_creation
        .as_ref()
        .map(|mc| mc.message_id.clone())
        .unwrap();
    let message = h.records.get_message(&h.thread.id, &message_id).unwrap();
    assert_eq!(message.text(), "Hello");
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.assistant_id.as_ref(), Some(&h.assistant.id));
}

#[test]
fn rate_limited_model_fails_run_and_step() {
    let h = Harness::with_thread_id("thrd-1");
    h.dispatcher
        .create_with_id(RunId::from("run-1"), &h.thread.id, h.request())
        .unwrap();
    let worker = h.worker(Arc::new(ScriptedModelClient::failing(
        ModelError::RateLimited("Resource has been exhausted".into()),
    )));
    QueueConsumer::drain(&worker).unwrap();

    let run = h.run(&RunId::from("run-1"));
    let step = h.step(&run.id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    let last_error = run.last_error.clone().unwrap();
    assert_eq!(last_error.code, LastErrorCode::RateLimitExceeded);
    assert_eq!(last_error.code.as_str(), "rate_limit_exceeded");
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.last_error, Some(last_error));
    assert!(h.replies().is_empty());
}

#[test]
fn cancelling_run_settles_with_its_step() {
    let h = Harness::new();
    let gate = Gate::new();
    let model = Arc::new(ScriptedModelClient::replying("late").with_gate(Arc::clone(&gate)));
    let worker = h.worker(model);
    let run = h.queue_run();

    let executing = {
        let worker = worker.clone();
        let id = run.id.clone();
        std::thread::spawn(move || worker.execute(&id))
    };
    assert!(gate.wait_entered(1, std::time::Duration::from_secs(5)));

    let cancelling = h.dispatcher.request_cancel(&run.id).unwrap();
    assert_eq!(cancelling.status, RunStatus::Cancelling);
    assert_eq!(h.step(&run.id).unwrap().status, StepStatus::InProgress);

    // the queue now holds the original execute and the cancel
    QueueConsumer::drain(&worker).unwrap();
    gate.open();
    assert_eq!(
        executing.join().unwrap().unwrap(),
        Outcome::Skipped(SkipReason::Conflict)
    );

    let run = h.run(&run.id);
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.cancelled_at.is_some());
    let step = h.step(&run.id).unwrap();
    assert_eq!(step.status, StepStatus::Cancelled);
    assert!(step.cancelled_at.is_some());
    h.assert_paired(&run.id);
}

#[test]
fn expiry_request_expires_queued_run() {
    let h = Harness::new();
    let run = h.queue_run();
    h.dispatcher.request_expire(&run.id).unwrap();

    // expire is delivered after execute, so run the expiry directly first
    let worker = h.worker(Arc::new(ScriptedModelClient::replying("unused")));
    assert_eq!(
        worker.expire(&run.id).unwrap(),
        Outcome::Transitioned(RunStatus::Expired)
    );
    QueueConsumer::drain(&worker).unwrap();

    let run = h.run(&run.id);
    assert_eq!(run.status, RunStatus::Expired);
    assert!(run.expired_at.is_some());
    assert!(h.step(&run.id).is_none());
}

#[test]
fn consumer_pool_processes_many_runs() {
    let h = Harness::new();
    let runs: Vec<Run> = (0..10).map(|_| h.queue_run()).collect();
    let worker = h.worker(Arc::new(ScriptedModelClient::replying("Hello")));

    let pool = QueueConsumer::start(worker).unwrap();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while h.db.pending() > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    pool.shutdown();

    assert_eq!(pool.stats().acked, 10);
    for run in &runs {
        assert_eq!(h.run(&run.id).status, RunStatus::Completed);
        h.assert_paired(&run.id);
    }
    assert_eq!(h.replies().len(), 10);
}
