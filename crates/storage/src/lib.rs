//! Storage layer for Runkeeper
//!
//! This crate implements the in-memory substrate underneath the transaction
//! layer:
//! - MemoryStore: BTreeMap-based ordered store with RwLock and a monotonic
//!   commit version
//! - MemoryQueue: at-least-once work queue with visibility timeouts,
//!   redelivery and dead-lettering
//!
//! A store owns its queue so that messages published by a commit become
//! receivable in the same critical section that makes the commit's records
//! visible.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod queue;

pub use memory::MemoryStore;
pub use queue::{DeadLetter, MemoryQueue, QueueOptions};
