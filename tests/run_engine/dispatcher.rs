//! Run creation and cancellation requests.

use std::sync::Arc;

use runkeeper::{
    AssistantId, Error, Metadata, QueueConsumer, RunAction, RunJobMessage,
};

use crate::common::*;

fn queued_messages(h: &Harness) -> Vec<RunJobMessage> {
    let mut messages = Vec::new();
    while let Some(delivery) = h.db.receive(std::time::Duration::ZERO).unwrap() {
        messages.push(RunJobMessage::from_payload(&delivery.payload).unwrap());
        h.db.ack(delivery.id).unwrap();
    }
    messages
}

#[test]
fn create_writes_run_and_execute_message_together() {
    let h = Harness::new();
    let run = h.queue_run();

    assert_eq!(run.status, RunStatus::Queued);
    assert_eq!(h.run(&run.id), run);
    assert_eq!(
        queued_messages(&h),
        vec![RunJobMessage::execute(run.id.clone())]
    );
}

#[test]
fn create_rejects_missing_thread_or_assistant() {
    let h = Harness::new();
    let version = h.db.current_version();

    let err = h
        .dispatcher
        .create(&ThreadId::from("thread_missing"), h.request())
        .unwrap_err();
    assert!(err.is_not_found());

    let err = h
        .dispatcher
        .create(
            &h.thread.id,
            CreateRunRequest::new(AssistantId::from("asst_missing")),
        )
        .unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(h.db.current_version(), version);
    assert_eq!(h.db.pending(), 0);
}

#[test]
fn create_with_taken_id_conflicts() {
    let h = Harness::new();
    let id = RunId::from("run_fixed");
    h.dispatcher
        .create_with_id(id.clone(), &h.thread.id, h.request())
        .unwrap();
    let err = h
        .dispatcher
        .create_with_id(id, &h.thread.id, h.request())
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(h.db.pending(), 1);
}

#[test]
fn instructions_concatenate_only_when_both_present() {
    let h = Harness::new();
    let both = h
        .dispatcher
        .create(
            &h.thread.id,
            h.request()
                .with_instructions("Answer briefly.")
                .with_additional_instructions(" Use French."),
        )
        .unwrap();
    assert_eq!(both.instructions.as_deref(), Some("Answer briefly. Use French."));

    let only_extra = h
        .dispatcher
        .create(&h.thread.id, h.request().with_additional_instructions("ignored"))
        .unwrap();
    assert_eq!(only_extra.instructions, None);
}

#[test]
fn run_settings_reach_the_model() {
    let h = Harness::new();
    let mut metadata = Metadata::new();
    metadata.insert("origin".into(), "test".into());
    let run = h
        .dispatcher
        .create(
            &h.thread.id,
            h.request()
                .with_model("gemini-flash")
                .with_instructions("Be brief.")
                .with_metadata(metadata.clone()),
        )
        .unwrap();
    assert_eq!(h.run(&run.id).metadata, metadata);

    let model = Arc::new(ScriptedModelClient::replying("ok"));
    QueueConsumer::drain(&h.worker(Arc::clone(&model))).unwrap();
    let request = &model.requests()[0];
    assert_eq!(request.model, "gemini-flash");
    assert_eq!(request.instructions.as_deref(), Some("Be brief."));
}

#[test]
fn request_cancel_marks_cancelling_and_queues_cancel() {
    let h = Harness::new();
    let run = h.queue_run();
    let cancelling = h.dispatcher.request_cancel(&run.id).unwrap();
    assert_eq!(cancelling.status, RunStatus::Cancelling);

    let actions: Vec<RunAction> = queued_messages(&h).into_iter().map(|m| m.action).collect();
    assert_eq!(actions, vec![RunAction::Execute, RunAction::Cancel]);
}

#[test]
fn request_cancel_rejects_settled_runs() {
    let h = Harness::new();
    let run = h.queue_run();
    QueueConsumer::drain(&h.worker(Arc::new(ScriptedModelClient::replying("done")))).unwrap();

    let version = h.db.current_version();
    let err = h.dispatcher.request_cancel(&run.id).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(err.to_string(), "invalid state: The run was already completed.");
    assert_eq!(h.db.current_version(), version);
    assert_eq!(h.db.pending(), 0);

    let other = h.queue_run();
    h.dispatcher.request_cancel(&other.id).unwrap();
    let err = h.dispatcher.request_cancel(&other.id).unwrap_err();
    assert_eq!(err.to_string(), "invalid state: The run was already cancelling.");
}

#[test]
fn requests_for_missing_runs_are_not_found() {
    let h = Harness::new();
    let ghost = RunId::from("run_ghost");
    let version = h.db.current_version();
    assert!(h.dispatcher.request_cancel(&ghost).unwrap_err().is_not_found());
    assert!(h.dispatcher.request_expire(&ghost).unwrap_err().is_not_found());
    assert_eq!(h.db.current_version(), version);
    assert_eq!(h.db.pending(), 0);
}
