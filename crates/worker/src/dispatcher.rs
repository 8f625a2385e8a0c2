//! Run dispatcher: the request side of the run lifecycle
//!
//! The dispatcher only ever writes a run together with the queue message
//! that will act on it, so a committed request is never lost and an
//! aborted one is never delivered.

use std::sync::Arc;

use runkeeper_core::{AssistantId, Error, Key, Metadata, Result, Run, RunId, RunStatus, ThreadId};
use runkeeper_engine::{Database, RecordTxnExt, RetryConfig};
use tracing::info;

use crate::message::RunJobMessage;

/// Parameters for a new run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRunRequest {
    /// Assistant that will answer
    pub assistant_id: AssistantId,
    /// Overrides the assistant's model
    pub model: Option<String>,
    /// Overrides the assistant's instructions
    pub instructions: Option<String>,
    /// Appended to `instructions`; ignored when `instructions` is absent
    pub additional_instructions: Option<String>,
    /// Caller metadata stored on the run
    pub metadata: Metadata,
}

impl CreateRunRequest {
    /// A request using the assistant's defaults
    pub fn new(assistant_id: AssistantId) -> Self {
        Self {
            assistant_id,
            model: None,
            instructions: None,
            additional_instructions: None,
            metadata: Metadata::new(),
        }
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Append to the instructions
    pub fn with_additional_instructions(mut self, extra: impl Into<String>) -> Self {
        self.additional_instructions = Some(extra.into());
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn resolved_instructions(&self) -> Option<String> {
        match (&self.instructions, &self.additional_instructions) {
            (Some(base), Some(extra)) => Some(format!("{}{}", base, extra)),
            (base, _) => base.clone(),
        }
    }
}

/// Creates runs and requests their cancellation or expiry
#[derive(Debug, Clone)]
pub struct RunDispatcher {
    db: Arc<Database>,
    retry: RetryConfig,
}

impl RunDispatcher {
    /// A dispatcher writing to `db`
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            retry: RetryConfig::default(),
        }
    }

    /// Retry policy for requests that race with worker transitions
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Queue a new run on `thread`
    ///
    /// # Errors
    ///
    /// `NotFound` if the thread or the assistant does not exist.
    pub fn create(&self, thread_id: &ThreadId, request: CreateRunRequest) -> Result<Run> {
        self.create_with_id(RunId::generate(), thread_id, request)
    }

    /// Queue a new run with a caller-chosen id
    ///
    /// # Errors
    ///
    /// `NotFound` if the thread or the assistant does not exist;
    /// `TransactionConflict` if the id is taken.
    pub fn create_with_id(
        &self,
        run_id: RunId,
        thread_id: &ThreadId,
        request: CreateRunRequest,
    ) -> Result<Run> {
        let mut run = Run::with_id(run_id, thread_id.clone(), request.assistant_id.clone());
        run.model = request.model.clone();
        run.instructions = request.resolved_instructions();
        run.metadata = request.metadata.clone();

        self.db.transaction(|txn| {
            txn.get_thread(thread_id)?;
            txn.get_assistant(&run.assistant_id)?;
            txn.insert_indexed(
                Key::run(&run.thread_id, &run.id),
                Key::run_index(&run.id),
                &run,
            )?;
            txn.enqueue(RunJobMessage::execute(run.id.clone()).to_payload()?)
        })?;

        info!(run_id = %run.id, thread_id = %thread_id, status = %run.status, "run queued");
        Ok(run)
    }

    /// Mark a run `cancelling` and queue the cancellation
    ///
    /// Retries when the worker moves the run between our read and commit.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist; `InvalidState` if it is already
    /// cancelling or finished.
    pub fn request_cancel(&self, run_id: &RunId) -> Result<Run> {
        let run = self.db.transaction_with_retry(self.retry.clone(), |txn| {
            let mut run = txn.get_run(run_id)?.into_value();
            if run.status == RunStatus::Cancelling || run.status.is_terminal() {
                return Err(Error::invalid_state(format!(
                    "The run was already {}.",
                    run.status
                )));
            }
            run.request_cancel()?;
            txn.put_record(Key::run(&run.thread_id, &run.id), &run)?;
            txn.enqueue(RunJobMessage::cancel(run.id.clone()).to_payload()?)?;
            Ok(run)
        })?;

        info!(run_id = %run.id, status = %run.status, "cancellation requested");
        Ok(run)
    }

    /// Queue an expiry check for a run
    ///
    /// Whether the run actually expires is decided by the worker against
    /// the state it finds.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run does not exist.
    pub fn request_expire(&self, run_id: &RunId) -> Result<()> {
        self.db.transaction(|txn| {
            txn.get_run(run_id)?;
            txn.enqueue(RunJobMessage::expire(run_id.clone()).to_payload()?)
        })?;
        info!(run_id = %run_id, "expiry requested");
        Ok(())
    }
}
