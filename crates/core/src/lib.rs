//! Core types and traits for Runkeeper
//!
//! This crate defines the foundational types used throughout the system:
//! - Entity ids: prefixed, time-ordered identifiers (`RunId`, `StepId`, ...)
//! - Key: hierarchical primary keys and flat secondary keys
//! - TypeTag: discriminates between entity kinds
//! - Value: what the store holds (a JSON record or a pointer to a primary key)
//! - Contract types: `Version`, `Versioned<T>`, `Timestamp`
//! - Records: Assistant, Thread, Message, Run, Step and their status enums
//! - Error: error type hierarchy
//! - Traits: the `Storage` and `WorkQueue` substrate contracts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod records;
pub mod traits;
pub mod types;
pub mod value;

pub use contract::{Timestamp, Version, Versioned};
pub use error::{Error, Result};
pub use records::{
    Assistant, LastError, LastErrorCode, Message, MessageContent, MessageCreation, Metadata,
    Role, Run, RunStatus, Step, StepDetails, StepStatus, StepType, TextContent, Thread,
};
pub use traits::{Delivery, Storage, WorkQueue, WriteBatch};
pub use types::{
    AssistantId, Key, KeyPrefix, MessageId, OrganizationId, RunId, StepId, ThreadId, TypeTag,
};
pub use value::Value;
