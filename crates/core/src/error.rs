//! Error types for Runkeeper
//!
//! This module defines the error type shared by every layer above the
//! substrate. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `TransactionConflict` | A version check failed at commit; nothing was written |
//! | `NotFound` | A referenced entity does not exist |
//! | `InvalidState` | The entity exists but the requested transition is not allowed |
//! | `InvalidInput` | Caller-supplied data or configuration is malformed |
//! | `Serialization` | A stored record could not be encoded or decoded |
//! | `Storage` | The substrate failed |
//! | `Internal` | Invariant violation (bug) |
//! | `Io` | A configuration file could not be read or written |

use std::io;
use thiserror::Error;

use crate::types::TypeTag;

/// Result type alias for Runkeeper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Runkeeper
#[derive(Debug, Error)]
pub enum Error {
    /// Optimistic version check failed at commit time
    #[error("transaction conflict: {reason}")]
    TransactionConflict {
        /// Human-readable description of the conflicting keys
        reason: String,
    },

    /// Entity not found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        kind: TypeTag,
        /// Public id that was looked up
        id: String,
    },

    /// Entity is in a state that does not allow the operation
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Human-readable reason
        reason: String,
    },

    /// Invalid input or configuration
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable reason
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {reason}")]
    Serialization {
        /// Underlying serializer message
        reason: String,
    },

    /// Storage layer error
    #[error("storage error: {reason}")]
    Storage {
        /// Human-readable reason
        reason: String,
    },

    /// Internal error (bug or invariant violation)
    #[error("internal error: {reason}")]
    Internal {
        /// Human-readable reason
        reason: String,
    },

    /// I/O error (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a `NotFound` error
    pub fn not_found(kind: TypeTag, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Build a `TransactionConflict` error
    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::TransactionConflict {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidState` error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Error::InvalidState {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidInput` error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Build an `Internal` error
    pub fn internal(reason: impl Into<String>) -> Self {
        Error::Internal {
            reason: reason.into(),
        }
    }

    /// True if this error is a failed version check
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionConflict { .. })
    }

    /// True if this error is a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization {
            reason: e.to_string(),
        }
    }
}
