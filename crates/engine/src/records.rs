//! Typed record access over the key scheme
//!
//! Two layers:
//! - [`RecordTxnExt`] adds typed reads and writes to a `TransactionContext`,
//!   so record operations compose with any other work in the same atomic
//!   commit. Every read lands in the transaction's read set.
//! - [`Records`] wraps a [`Database`] for callers that need one record
//!   operation as its own transaction (creation, lookups, listing).
//!
//! Entities with a secondary key are always inserted through
//! `insert_indexed`, which writes the record and its pointer together and
//! requires both keys to be absent at commit time.

use std::sync::Arc;

use runkeeper_concurrency::TransactionContext;
use runkeeper_core::{
    Assistant, AssistantId, Error, Key, KeyPrefix, Message, MessageId, OrganizationId, Result,
    Run, RunId, Step, StepId, Thread, ThreadId, TypeTag, Value, Version, Versioned,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::database::Database;
use crate::list::{paginate, sort_by_creation, List, ListParams};

/// Extension trait for typed record operations within transactions
///
/// # Usage
///
/// ```ignore
/// db.transaction(|txn| {
///     let run = txn.get_run(&run_id)?;
///     let step = txn.step_for_run(&run_id)?;
///     ...
/// })?;
/// ```
pub trait RecordTxnExt {
    /// Read and decode the record stored under a primary key
    fn get_record<T: DeserializeOwned>(&mut self, key: &Key) -> Result<Option<Versioned<T>>>;

    /// Buffer a record write under a primary key
    fn put_record<T: Serialize>(&mut self, key: Key, record: &T) -> Result<()>;

    /// Follow a secondary key to its primary key
    fn resolve(&mut self, index: &Key) -> Result<Option<Key>>;

    /// Write a record and its secondary pointer, both required to be absent
    fn insert_indexed<T: Serialize>(&mut self, primary: Key, index: Key, record: &T)
        -> Result<()>;

    /// Look up an assistant by public id
    fn get_assistant(&mut self, id: &AssistantId) -> Result<Versioned<Assistant>>;

    /// Look up a thread by public id
    fn get_thread(&mut self, id: &ThreadId) -> Result<Versioned<Thread>>;

    /// Look up a run by public id
    fn get_run(&mut self, id: &RunId) -> Result<Versioned<Run>>;

    /// Look up a step by public id
    fn get_step(&mut self, id: &StepId) -> Result<Versioned<Step>>;

    /// The step belonging to `run`, if one was created
    fn step_for_run(&mut self, run: &RunId) -> Result<Option<Versioned<Step>>>;

    /// Every message of a thread, oldest first
    fn thread_messages(&mut self, thread: &ThreadId) -> Result<Vec<Message>>;
}

impl RecordTxnExt for TransactionContext {
    fn get_record<T: DeserializeOwned>(&mut self, key: &Key) -> Result<Option<Versioned<T>>> {
        match self.get_versioned(key)? {
            Some(stored) => Ok(Some(stored.try_map(|value| value.to_record::<T>())?)),
            None => Ok(None),
        }
    }

    fn put_record<T: Serialize>(&mut self, key: Key, record: &T) -> Result<()> {
        self.put(key, Value::from_record(record)?)
    }

    fn resolve(&mut self, index: &Key) -> Result<Option<Key>> {
        match self.get(index)? {
            None => Ok(None),
            Some(Value::Pointer(primary)) => Ok(Some(primary)),
            Some(Value::Record(_)) => Err(Error::internal(format!(
                "secondary key {} holds a record instead of a pointer",
                index
            ))),
        }
    }

    fn insert_indexed<T: Serialize>(
        &mut self,
        primary: Key,
        index: Key,
        record: &T,
    ) -> Result<()> {
        self.check(primary.clone(), Version::ABSENT)?;
        self.check(index.clone(), Version::ABSENT)?;
        self.put(index, Value::Pointer(primary.clone()))?;
        self.put_record(primary, record)
    }

    fn get_assistant(&mut self, id: &AssistantId) -> Result<Versioned<Assistant>> {
        get_indexed(self, &Key::assistant_index(id), TypeTag::Assistant)
    }

    fn get_thread(&mut self, id: &ThreadId) -> Result<Versioned<Thread>> {
        get_indexed(self, &Key::thread_index(id), TypeTag::Thread)
    }

    fn get_run(&mut self, id: &RunId) -> Result<Versioned<Run>> {
        get_indexed(self, &Key::run_index(id), TypeTag::Run)
    }

    fn get_step(&mut self, id: &StepId) -> Result<Versioned<Step>> {
        get_indexed(self, &Key::step_index(id), TypeTag::Step)
    }

    fn step_for_run(&mut self, run: &RunId) -> Result<Option<Versioned<Step>>> {
        let entries = self.scan_prefix(&KeyPrefix::steps(run))?;
        // A run owns at most one step.
        match entries.into_iter().next() {
            Some((key, _)) => self.get_record(&key),
            None => Ok(None),
        }
    }

    fn thread_messages(&mut self, thread: &ThreadId) -> Result<Vec<Message>> {
        let mut messages = self
            .scan_prefix(&KeyPrefix::messages(thread))?
            .into_iter()
            .map(|(_, value)| value.to_record())
            .collect::<Result<Vec<Message>>>()?;
        sort_by_creation(&mut messages);
        Ok(messages)
    }
}

fn get_indexed<T: DeserializeOwned>(
    txn: &mut TransactionContext,
    index: &Key,
    kind: TypeTag,
) -> Result<Versioned<T>> {
    let primary = txn
        .resolve(index)?
        .ok_or_else(|| Error::not_found(kind, index.id.clone()))?;
    txn.get_record(&primary)?.ok_or_else(|| {
        Error::internal(format!(
            "secondary key {} points at missing record {}",
            index, primary
        ))
    })
}

/// Something that can produce a thread's messages in creation order
///
/// The worker reads conversation history through this seam.
pub trait MessageStore: Send + Sync {
    /// All messages of `thread`, oldest first
    fn list_by_thread(&self, thread: &ThreadId) -> Result<Vec<Message>>;
}

/// Record operations that each run as their own transaction
#[derive(Debug, Clone)]
pub struct Records {
    db: Arc<Database>,
}

impl Records {
    /// Wrap a database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The wrapped database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Persist a new assistant owned by `org`.
    pub fn create_assistant(&self, org: &OrganizationId, assistant: Assistant) -> Result<Assistant> {
        self.db.transaction(|txn| {
            txn.insert_indexed(
                Key::assistant(org, &assistant.id),
                Key::assistant_index(&assistant.id),
                &assistant,
            )
        })?;
        debug!(assistant_id = %assistant.id, "assistant created");
        Ok(assistant)
    }

    /// Persist a new thread owned by `org`.
    pub fn create_thread(&self, org: &OrganizationId, thread: Thread) -> Result<Thread> {
        self.db.transaction(|txn| {
            txn.insert_indexed(
                Key::thread(org, &thread.id),
                Key::thread_index(&thread.id),
                &thread,
            )
        })?;
        debug!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    /// Append a message to an existing thread.
    ///
    /// # Errors
    ///
    /// `NotFound` if the thread does not exist.
    pub fn create_message(&self, message: Message) -> Result<Message> {
        self.db.transaction(|txn| {
            txn.get_thread(&message.thread_id)?;
            let key = Key::message(&message.thread_id, &message.id);
            txn.check(key.clone(), Version::ABSENT)?;
            txn.put_record(key, &message)
        })?;
        debug!(thread_id = %message.thread_id, message_id = %message.id, "message created");
        Ok(message)
    }

    /// Look up an assistant
    pub fn get_assistant(&self, id: &AssistantId) -> Result<Assistant> {
        self.db
            .transaction(|txn| txn.get_assistant(id))
            .map(Versioned::into_value)
    }

    /// Look up a thread
    pub fn get_thread(&self, id: &ThreadId) -> Result<Thread> {
        self.db
            .transaction(|txn| txn.get_thread(id))
            .map(Versioned::into_value)
    }

    /// Look up a run
    pub fn get_run(&self, id: &RunId) -> Result<Run> {
        self.db
            .transaction(|txn| txn.get_run(id))
            .map(Versioned::into_value)
    }

    /// Look up a step
    pub fn get_step(&self, id: &StepId) -> Result<Step> {
        self.db
            .transaction(|txn| txn.get_step(id))
            .map(Versioned::into_value)
    }

    /// Look up a message; messages have no secondary key
    pub fn get_message(&self, thread: &ThreadId, id: &MessageId) -> Result<Message> {
        self.db.transaction(|txn| {
            txn.get_record::<Message>(&Key::message(thread, id))?
                .map(Versioned::into_value)
                .ok_or_else(|| Error::not_found(TypeTag::Message, id.as_str()))
        })
    }

    /// The run's step, if the worker has created it
    pub fn step_for_run(&self, run: &RunId) -> Result<Option<Step>> {
        self.db
            .transaction(|txn| txn.step_for_run(run))
            .map(|step| step.map(Versioned::into_value))
    }

    /// Every message of a thread, oldest first
    pub fn messages_for_thread(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        self.db.transaction(|txn| txn.thread_messages(thread))
    }

    /// One page of a thread's messages
    pub fn list_messages(&self, thread: &ThreadId, params: &ListParams) -> Result<List<Message>> {
        params.validate()?;
        let messages = self.db.transaction(|txn| {
            txn.get_thread(thread)?;
            txn.thread_messages(thread)
        })?;
        paginate(messages, params)
    }

    /// One page of a thread's runs
    pub fn list_runs(&self, thread: &ThreadId, params: &ListParams) -> Result<List<Run>> {
        params.validate()?;
        let runs = self.db.transaction(|txn| {
            txn.get_thread(thread)?;
            decode_all(txn.scan_prefix(&KeyPrefix::runs(thread))?)
        })?;
        paginate(runs, params)
    }

    /// One page of a run's steps
    pub fn list_steps(&self, run: &RunId, params: &ListParams) -> Result<List<Step>> {
        params.validate()?;
        let steps = self.db.transaction(|txn| {
            txn.get_run(run)?;
            decode_all(txn.scan_prefix(&KeyPrefix::steps(run))?)
        })?;
        paginate(steps, params)
    }
}

fn decode_all<T: DeserializeOwned>(entries: Vec<(Key, Value)>) -> Result<Vec<T>> {
    entries
        .into_iter()
        .map(|(_, value)| value.to_record())
        .collect()
}

impl MessageStore for Records {
    fn list_by_thread(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        self.messages_for_thread(thread)
    }
}
