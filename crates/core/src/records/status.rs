//! Run and step status enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a run
///
/// ```text
/// queued ──► in_progress ──► completed | failed
///   │             │
///   ├─────────────┴──► cancelling ──► cancelled | failed
///   └─────────────┴──► expired
/// ```
///
/// `requires_action` is part of the public shape but nothing enters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting for a worker
    Queued,
    /// A worker has started the run
    InProgress,
    /// Waiting on the caller (unused)
    RequiresAction,
    /// Cancellation requested
    Cancelling,
    /// Cancelled
    Cancelled,
    /// Ended with an error
    Failed,
    /// Finished successfully
    Completed,
    /// Expired before finishing
    Expired,
}

impl RunStatus {
    /// All statuses, in declaration order
    pub const ALL: [RunStatus; 8] = [
        RunStatus::Queued,
        RunStatus::InProgress,
        RunStatus::RequiresAction,
        RunStatus::Cancelling,
        RunStatus::Cancelled,
        RunStatus::Failed,
        RunStatus::Completed,
        RunStatus::Expired,
    ];

    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Completed | RunStatus::Expired
        )
    }

    /// Check if transition from current to target is valid
    ///
    /// ## Valid Transitions
    /// - Queued: start, request cancel, expire
    /// - InProgress: complete, fail, request cancel, expire
    /// - RequiresAction: resume, request cancel, expire
    /// - Cancelling: cancelled or failed
    /// - Terminal statuses: none
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, target),
            (Queued, InProgress)
                | (Queued, Cancelling)
                | (Queued, Expired)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelling)
                | (InProgress, Expired)
                | (RequiresAction, InProgress)
                | (RequiresAction, Cancelling)
                | (RequiresAction, Expired)
                | (Cancelling, Cancelled)
                | (Cancelling, Failed)
        )
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a run step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Created together with the run's `in_progress` transition
    InProgress,
    /// Cancelled with its run
    Cancelled,
    /// Failed with its run
    Failed,
    /// Completed with its run
    Completed,
    /// Expired with its run
    Expired,
}

impl StepStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::InProgress)
    }

    /// Only `in_progress` steps move, and only to a terminal status
    pub fn can_transition_to(&self, target: StepStatus) -> bool {
        matches!(self, StepStatus::InProgress) && target.is_terminal()
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::InProgress => "in_progress",
            StepStatus::Cancelled => "cancelled",
            StepStatus::Failed => "failed",
            StepStatus::Completed => "completed",
            StepStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure code stored on failed runs and steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastErrorCode {
    /// The model backend failed
    ServerError,
    /// The model backend rejected the call for rate limiting
    RateLimitExceeded,
    /// Anything else
    UnknownError,
}

impl LastErrorCode {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            LastErrorCode::ServerError => "server_error",
            LastErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            LastErrorCode::UnknownError => "unknown_error",
        }
    }
}

/// Error recorded on a failed run and its step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    /// Classified code
    pub code: LastErrorCode,
    /// Detail from the failing collaborator, verbatim
    pub message: String,
}

impl LastError {
    /// Create a last error
    pub fn new(code: LastErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
