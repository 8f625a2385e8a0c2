//! Runkeeper - run execution engine for assistant threads
//!
//! A run asks an assistant to answer the messages of a thread. Runkeeper
//! keeps runs, their steps and the thread history in a transactional
//! key-value store, and drives each run through its lifecycle from a work
//! queue:
//!
//! ```text
//! queued → in_progress → completed | failed
//!    ↘ cancelling → cancelled
//!    ↘ expired
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use runkeeper::{
//!     Assistant, CreateRunRequest, Database, Message, OrganizationId, QueueConsumer,
//!     Records, RunDispatcher, RunWorker, Thread,
//! };
//!
//! let db = Database::new();
//! let records = Records::new(Arc::clone(&db));
//! let org = OrganizationId::default();
//! let assistant = records.create_assistant(&org, Assistant::new("gemini-pro"))?;
//! let thread = records.create_thread(&org, Thread::new())?;
//! records.create_message(Message::user(thread.id.clone(), "Hi"))?;
//!
//! let run = RunDispatcher::new(Arc::clone(&db))
//!     .create(&thread.id, CreateRunRequest::new(assistant.id.clone()))?;
//! let consumers = QueueConsumer::start(RunWorker::new(db, my_model_client))?;
//! ```
//!
//! # Architecture
//!
//! - `runkeeper-core`: ids, keys, versions, records and the run status table
//! - `runkeeper-storage`: in-memory store and at-least-once queue
//! - `runkeeper-concurrency`: optimistic transactions with version checks
//! - `runkeeper-engine`: the database handle, typed records, listing, config
//! - `runkeeper-worker`: dispatcher, worker state machine, queue consumers

pub use runkeeper_core::{
    Assistant, AssistantId, Error, Key, LastError, LastErrorCode, Message, MessageId, Metadata,
    OrganizationId, Result, Role, Run, RunId, RunStatus, Step, StepId, StepStatus, Thread,
    ThreadId, Timestamp, Version, Versioned,
};
pub use runkeeper_engine::{
    Database, List, ListParams, MessageStore, Order, QueueConfig, Records, RetryConfig,
    RunkeeperConfig, WorkerConfig, CONFIG_FILE_NAME,
};
pub use runkeeper_worker::{
    logging, ChatTurn, ConsumerStats, CreateRunRequest, ModelClient, ModelError, Outcome,
    QueueConsumer, RunAction, RunDispatcher, RunJobMessage, RunWorker, SkipReason,
};

/// Lower layers, for callers that need the raw substrate
pub mod substrate {
    pub use runkeeper_concurrency::{TransactionContext, TransactionManager};
    pub use runkeeper_storage::{DeadLetter, MemoryQueue, MemoryStore, QueueOptions};
}

/// Test doubles for model clients
pub mod testing {
    pub use runkeeper_worker::testing::{Gate, ModelRequest, ScriptedModelClient};
}
