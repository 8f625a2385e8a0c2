//! Shared fixtures for the run engine suites.

#![allow(dead_code)]

use std::sync::Arc;

pub use runkeeper::testing::{Gate, ScriptedModelClient};
pub use runkeeper::{
    Assistant, CreateRunRequest, Database, Message, OrganizationId, Outcome, Records, Role, Run,
    RunDispatcher, RunId, RunStatus, RunWorker, SkipReason, Step, StepStatus, Thread, ThreadId,
};

/// A database with one assistant and one thread holding a user message.
pub struct Harness {
    pub db: Arc<Database>,
    pub records: Records,
    pub dispatcher: RunDispatcher,
    pub assistant: Assistant,
    pub thread: Thread,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_database(Database::new())
    }

    pub fn with_database(db: Arc<Database>) -> Self {
        Self::build(db, Thread::new())
    }

    /// Same fixture, with a caller-chosen thread id.
    pub fn with_thread_id(id: &str) -> Self {
        Self::build(Database::new(), Thread::with_id(ThreadId::from(id)))
    }

    fn build(db: Arc<Database>, thread: Thread) -> Self {
        let records = Records::new(Arc::clone(&db));
        let org = OrganizationId::default();
        let assistant = records
            .create_assistant(&org, Assistant::new("gemini-pro").with_name("helper"))
            .unwrap();
        let thread = records.create_thread(&org, thread).unwrap();
        records
            .create_message(Message::user(thread.id.clone(), "Hi"))
            .unwrap();
        Self {
            dispatcher: RunDispatcher::new(Arc::clone(&db)),
            db,
            records,
            assistant,
            thread,
        }
    }

    pub fn request(&self) -> CreateRunRequest {
        CreateRunRequest::new(self.assistant.id.clone())
    }

    pub fn queue_run(&self) -> Run {
        self.dispatcher.create(&self.thread.id, self.request()).unwrap()
    }

    pub fn worker(&self, model: Arc<ScriptedModelClient>) -> RunWorker {
        RunWorker::new(Arc::clone(&self.db), model)
    }

    pub fn run(&self, id: &RunId) -> Run {
        self.records.get_run(id).unwrap()
    }

    pub fn step(&self, id: &RunId) -> Option<Step> {
        self.records.step_for_run(id).unwrap()
    }

    pub fn replies(&self) -> Vec<Message> {
        self.records
            .messages_for_thread(&self.thread.id)
            .unwrap()
            .into_iter()
            .filter(|m| m.role == Role::Assistant)
            .collect()
    }

    /// A terminal run never sits next to a step that is still running, and a
    /// finished step always matches its run.
    pub fn assert_paired(&self, id: &RunId) {
        let run = self.run(id);
        let step = self.step(id);
        match (run.status, step.map(|s| s.status)) {
            (_, None) => assert!(
                !matches!(
                    run.status,
                    RunStatus::InProgress | RunStatus::Completed | RunStatus::Failed
                ),
                "run {} is {} without a step",
                id,
                run.status
            ),
            (RunStatus::InProgress | RunStatus::Cancelling, Some(step)) => {
                assert_eq!(step, StepStatus::InProgress)
            }
            (RunStatus::Completed, Some(step)) => assert_eq!(step, StepStatus::Completed),
            (RunStatus::Failed, Some(step)) => assert_eq!(step, StepStatus::Failed),
            (RunStatus::Cancelled, Some(step)) => assert_eq!(step, StepStatus::Cancelled),
            (RunStatus::Expired, Some(step)) => assert_eq!(step, StepStatus::Expired),
            (RunStatus::Queued | RunStatus::RequiresAction, Some(step)) => {
                panic!("{} run {} has a {} step", run.status, id, step)
            }
        }
    }
}
