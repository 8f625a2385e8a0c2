//! Run worker: the state machine behind the queue
//!
//! The worker is stateless. Every handler is a function of persisted state
//! and one queue message, and every state change is one version-checked
//! transaction, so duplicate deliveries and racing handlers for the same
//! run settle on a single winner.
//!
//! ## Execute
//!
//! ```text
//! 1. txn: read run; unless queued → skip
//!         run → in_progress, create step (in_progress)      => version v
//! 2. model call, outside any transaction
//! 3. txn: require run and step still at v
//!         success: create message, step → completed, run → completed
//!         failure: step → failed, run → failed, same last_error
//! ```
//!
//! A conflict in (1) means another delivery started the run; a conflict in
//! (3) means cancel or expire got there first. Both are skipped, never
//! retried.
//!
//! ## Cancel / Expire
//!
//! One transaction each: the run must be `cancelling` (cancel) or `queued` /
//! `in_progress` (expire); it moves to the terminal state together with its
//! step if that step is still `in_progress`.

use std::sync::Arc;

use runkeeper_concurrency::TransactionContext;
use runkeeper_core::{
    Error, Key, Message, Result, Run, RunId, RunStatus, Step, StepStatus, Version,
};
use runkeeper_engine::{Database, MessageStore, RecordTxnExt, Records};
use tracing::{debug, info, warn};

use crate::message::{RunAction, RunJobMessage};
use crate::model::{ChatHistory, ModelClient, ModelError};

/// Why a message changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The run does not exist
    NotFound,
    /// The run was not in a status this action applies to
    StatusMismatch(RunStatus),
    /// A competing commit touched the run first
    Conflict,
    /// The message named an action this worker does not know
    UnknownAction,
    /// The payload was not a run job message
    Malformed,
}

/// What handling one message did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The run reached this status
    Transitioned(RunStatus),
    /// Nothing was written
    Skipped(SkipReason),
}

impl Outcome {
    /// Whether the message changed nothing
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }
}

/// Executes, cancels and expires runs
#[derive(Clone)]
pub struct RunWorker {
    db: Arc<Database>,
    messages: Arc<dyn MessageStore>,
    model: Arc<dyn ModelClient>,
}

impl std::fmt::Debug for RunWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunWorker").finish_non_exhaustive()
    }
}

impl RunWorker {
    /// A worker reading thread history from `db` itself
    pub fn new(db: Arc<Database>, model: Arc<dyn ModelClient>) -> Self {
        let messages = Arc::new(Records::new(Arc::clone(&db)));
        Self {
            db,
            messages,
            model,
        }
    }

    /// Read thread history from another store
    pub fn with_message_store(mut self, messages: Arc<dyn MessageStore>) -> Self {
        self.messages = messages;
        self
    }

    /// The database this worker writes to
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Decode and handle one queue payload
    ///
    /// Payloads that are not run job messages are skipped, not failed: they
    /// would never decode on redelivery either.
    pub fn handle_payload(&self, payload: &serde_json::Value) -> Result<Outcome> {
        match RunJobMessage::from_payload(payload) {
            Ok(message) => self.handle(&message),
            Err(e) => {
                warn!(error = %e, "dropping malformed queue message");
                Ok(Outcome::Skipped(SkipReason::Malformed))
            }
        }
    }

    /// Handle one run job message
    ///
    /// # Errors
    ///
    /// Only substrate failures; missing runs, conflicts and status
    /// mismatches are reported as [`Outcome::Skipped`].
    pub fn handle(&self, message: &RunJobMessage) -> Result<Outcome> {
        match message.action {
            RunAction::Execute => self.execute(&message.run_id),
            RunAction::Cancel => self.cancel(&message.run_id),
            RunAction::Expire => self.expire(&message.run_id),
            RunAction::Unknown => {
                debug!(run_id = %message.run_id, "ignoring unknown action");
                Ok(Outcome::Skipped(SkipReason::UnknownAction))
            }
        }
    }

    /// Drive a queued run to `completed` or `failed`
    pub fn execute(&self, run_id: &RunId) -> Result<Outcome> {
        let started = self.db.transaction_with_version(|txn| {
            let run = txn.get_run(run_id)?.into_value();
            if run.status != RunStatus::Queued {
                return Ok(Err(run.status));
            }
            let mut run = run;
            run.start()?;
            let step = Step::for_run(&run);
            txn.insert_indexed(
                Key::step(&run.id, &step.id),
                Key::step_index(&step.id),
                &step,
            )?;
            txn.put_record(Key::run(&run.thread_id, &run.id), &run)?;
            Ok(Ok((run, step)))
        });

        let ((run, step), version) = match started {
            Ok((Ok(started), version)) => (started, version),
            Ok((Err(status), _)) => {
                debug!(run_id = %run_id, status = %status, "run not queued, nothing to execute");
                return Ok(Outcome::Skipped(SkipReason::StatusMismatch(status)));
            }
            Err(e) => return skip_or_fail(e, run_id, RunAction::Execute),
        };
        info!(run_id = %run.id, step_id = %step.id, status = %run.status, "run started");

        let outcome = match self.generate(&run) {
            Ok(reply) => self.finish_completed(&run, &step, version, reply),
            Err(model_error) => {
                warn!(run_id = %run.id, error = %model_error, "model call failed");
                self.finish_failed(&run, &step, version, &model_error)
            }
        };
        outcome.or_else(|e| skip_or_fail(e, run_id, RunAction::Execute))
    }

    /// Resolve model and instructions, read the thread, call the model
    ///
    /// Any failure preparing the call is classified like a model failure so
    /// the run still ends `failed`.
    fn generate(&self, run: &Run) -> std::result::Result<String, ModelError> {
        let assistant = self
            .db
            .transaction(|txn| txn.get_assistant(&run.assistant_id))
            .map_err(|e| ModelError::Unknown(e.to_string()))?
            .into_value();
        let model = run.model.as_deref().unwrap_or(&assistant.model);
        let instructions = run
            .instructions
            .as_deref()
            .or(assistant.instructions.as_deref());

        let messages = self
            .messages
            .list_by_thread(&run.thread_id)
            .map_err(|e| ModelError::Unknown(e.to_string()))?;
        let history = ChatHistory::from_messages(&messages, instructions)?;

        debug!(run_id = %run.id, model, turns = history.turns().len(), "calling model");
        self.model
            .generate_reply(model, history.turns(), history.instructions())
    }

    fn finish_completed(
        &self,
        run: &Run,
        step: &Step,
        version: Version,
        reply: String,
    ) -> Result<Outcome> {
        self.db.transaction(|txn| {
            let (mut run, mut step) = reload_unchanged(txn, run, step, version)?;
            let message = Message::assistant_reply(
                run.thread_id.clone(),
                run.assistant_id.clone(),
                run.id.clone(),
                reply.clone(),
            );
            let message_key = Key::message(&message.thread_id, &message.id);
            txn.check(message_key.clone(), Version::ABSENT)?;
            txn.put_record(message_key, &message)?;

            step.complete(message.id.clone())?;
            run.complete()?;
            txn.put_record(Key::step(&step.run_id, &step.id), &step)?;
            txn.put_record(Key::run(&run.thread_id, &run.id), &run)?;
            Ok(())
        })?;
        info!(run_id = %run.id, status = "completed", "run completed");
        Ok(Outcome::Transitioned(RunStatus::Completed))
    }

    fn finish_failed(
        &self,
        run: &Run,
        step: &Step,
        version: Version,
        model_error: &ModelError,
    ) -> Result<Outcome> {
        let last_error = model_error.to_last_error();
        self.db.transaction(|txn| {
            let (mut run, mut step) = reload_unchanged(txn, run, step, version)?;
            step.fail(last_error.clone())?;
            run.fail(last_error.clone())?;
            txn.put_record(Key::step(&step.run_id, &step.id), &step)?;
            txn.put_record(Key::run(&run.thread_id, &run.id), &run)?;
            Ok(())
        })?;
        info!(
            run_id = %run.id,
            status = "failed",
            code = last_error.code.as_str(),
            "run failed"
        );
        Ok(Outcome::Transitioned(RunStatus::Failed))
    }

    /// Finish a requested cancellation
    pub fn cancel(&self, run_id: &RunId) -> Result<Outcome> {
        self.settle(run_id, Settlement::Cancel)
    }

    /// Expire a run that has not finished
    pub fn expire(&self, run_id: &RunId) -> Result<Outcome> {
        self.settle(run_id, Settlement::Expire)
    }

    /// Move the run, and its step if still running, to a terminal state in
    /// one write
    fn settle(&self, run_id: &RunId, settlement: Settlement) -> Result<Outcome> {
        let (action, target) = (settlement.action(), settlement.target());

        let settled = self.db.transaction(|txn| {
            let read = txn.get_run(run_id)?;
            let run_version = read.version();
            let mut run = read.into_value();
            if !settlement.applies(run.status) {
                return Ok(Err(run.status));
            }
            let run_key = Key::run(&run.thread_id, &run.id);
            txn.check(run_key.clone(), run_version)?;
            settlement.apply_to_run(&mut run)?;
            txn.put_record(run_key, &run)?;

            if let Some(read_step) = txn.step_for_run(run_id)? {
                let step_version = read_step.version();
                let mut step = read_step.into_value();
                if step.status == StepStatus::InProgress {
                    let step_key = Key::step(&step.run_id, &step.id);
                    txn.check(step_key.clone(), step_version)?;
                    settlement.apply_to_step(&mut step)?;
                    txn.put_record(step_key, &step)?;
                }
            }
            Ok(Ok(()))
        });

        match settled {
            Ok(Ok(())) => {
                info!(run_id = %run_id, action = %action, status = %target, "run settled");
                Ok(Outcome::Transitioned(target))
            }
            Ok(Err(status)) => {
                debug!(run_id = %run_id, action = %action, status = %status, "run not eligible");
                Ok(Outcome::Skipped(SkipReason::StatusMismatch(status)))
            }
            Err(e) => skip_or_fail(e, run_id, action),
        }
    }
}

/// The two ways a run ends without an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Cancel,
    Expire,
}

impl Settlement {
    fn action(self) -> RunAction {
        match self {
            Settlement::Cancel => RunAction::Cancel,
            Settlement::Expire => RunAction::Expire,
        }
    }

    fn target(self) -> RunStatus {
        match self {
            Settlement::Cancel => RunStatus::Cancelled,
            Settlement::Expire => RunStatus::Expired,
        }
    }

    fn applies(self, status: RunStatus) -> bool {
        match self {
            Settlement::Cancel => status == RunStatus::Cancelling,
            Settlement::Expire => matches!(status, RunStatus::Queued | RunStatus::InProgress),
        }
    }

    fn apply_to_run(self, run: &mut Run) -> Result<()> {
        match self {
            Settlement::Cancel => run.cancel(),
            Settlement::Expire => run.expire(),
        }
    }

    fn apply_to_step(self, step: &mut Step) -> Result<()> {
        match self {
            Settlement::Cancel => step.cancel(),
            Settlement::Expire => step.expire(),
        }
    }
}

/// Re-read run and step, requiring both to be exactly as `version` left them.
fn reload_unchanged(
    txn: &mut TransactionContext,
    run: &Run,
    step: &Step,
    version: Version,
) -> Result<(Run, Step)> {
    let run_key = Key::run(&run.thread_id, &run.id);
    let step_key = Key::step(&step.run_id, &step.id);
    txn.check(run_key.clone(), version)?;
    txn.check(step_key.clone(), version)?;

    let current_run = txn.get_run(&run.id)?;
    let current_step = txn
        .get_record::<Step>(&step_key)?
        .ok_or_else(|| Error::internal(format!("step {} vanished", step.id)))?;
    if current_run.version() != version || current_step.version() != version {
        return Err(Error::conflict(format!(
            "run {} changed while the model was running",
            run.id
        )));
    }
    Ok((current_run.into_value(), current_step.into_value()))
}

/// Turn expected races into skips; everything else is a real failure.
fn skip_or_fail(e: Error, run_id: &RunId, action: RunAction) -> Result<Outcome> {
    if e.is_conflict() {
        warn!(run_id = %run_id, action = %action, error = %e, "lost race, dropping message");
        Ok(Outcome::Skipped(SkipReason::Conflict))
    } else if e.is_not_found() {
        debug!(run_id = %run_id, action = %action, "run not found");
        Ok(Outcome::Skipped(SkipReason::NotFound))
    } else {
        Err(e)
    }
}
