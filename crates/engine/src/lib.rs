//! Database engine for Runkeeper
//!
//! This crate ties the lower layers together:
//! - Database: store + queue + transaction manager behind one handle, with
//!   the transaction closure API and configuration
//! - Records: typed access to assistants, threads, messages, runs and steps
//!   over the key scheme
//! - Listing: cursor pagination over ordered children
//!
//! The engine is the only component that knows how records map onto keys.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod list;
pub mod records;

pub use database::{
    Database, QueueConfig, RetryConfig, RunkeeperConfig, WorkerConfig, CONFIG_FILE_NAME,
};
pub use list::{
    paginate, sort_by_creation, List, ListParams, Listable, Order, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use records::{MessageStore, RecordTxnExt, Records};
