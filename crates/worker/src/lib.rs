//! Run execution for Runkeeper
//!
//! This crate turns queued runs into assistant replies:
//! - [`RunDispatcher`]: creates runs and requests cancellation or expiry,
//!   each together with its queue message
//! - [`RunWorker`]: the execute / cancel / expire state machine
//! - [`QueueConsumer`]: threads feeding queue deliveries to a worker
//! - [`ModelClient`]: the seam to a language model backend
//!
//! The worker holds no state of its own; everything it decides is read from
//! and written to the [`Database`](runkeeper_engine::Database) it is given.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consumer;
pub mod dispatcher;
pub mod logging;
pub mod message;
pub mod model;
pub mod testing;
pub mod worker;

pub use consumer::{ConsumerStats, QueueConsumer};
pub use dispatcher::{CreateRunRequest, RunDispatcher};
pub use message::{RunAction, RunJobMessage};
pub use model::{ChatHistory, ChatRole, ChatTurn, ModelClient, ModelError};
pub use worker::{Outcome, RunWorker, SkipReason};
