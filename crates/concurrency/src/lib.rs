//! Concurrency layer for Runkeeper
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: read-set, write-set, version checks and a buffer of
//!   queue messages published on commit
//! - Validation: first-committer-wins on the read-set and explicit checks
//! - TransactionManager: serialized validate-and-apply under a commit lock

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::TransactionManager;
pub use transaction::{
    CommitError, PendingOperations, TransactionContext, TransactionStatus, VersionCheck,
};
pub use validation::{validate_transaction, ConflictType, ValidationResult};
