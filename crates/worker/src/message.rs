//! Queue wire message
//!
//! Every delivery on the work queue is a JSON object
//! `{"action": "execute" | "cancel" | "expire", "runId": "<run id>"}`.
//! Actions this version does not know decode to [`RunAction::Unknown`] so
//! they can be acknowledged instead of retried.

use runkeeper_core::{Error, Result, RunId};
use serde::{Deserialize, Serialize};

/// What a queue message asks the worker to do with a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunAction {
    /// Drive a queued run to completion
    Execute,
    /// Finish a cancellation the dispatcher requested
    Cancel,
    /// Expire a run that has waited too long
    Expire,
    /// Any action this version does not understand
    #[serde(other)]
    Unknown,
}

impl RunAction {
    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            RunAction::Execute => "execute",
            RunAction::Cancel => "cancel",
            RunAction::Expire => "expire",
            RunAction::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work for the run worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunJobMessage {
    /// Requested action
    pub action: RunAction,
    /// Target run
    #[serde(rename = "runId")]
    pub run_id: RunId,
}

impl RunJobMessage {
    /// `execute` message for a run
    pub fn execute(run_id: RunId) -> Self {
        Self {
            action: RunAction::Execute,
            run_id,
        }
    }

    /// `cancel` message for a run
    pub fn cancel(run_id: RunId) -> Self {
        Self {
            action: RunAction::Cancel,
            run_id,
        }
    }

    /// `expire` message for a run
    pub fn expire(run_id: RunId) -> Self {
        Self {
            action: RunAction::Expire,
            run_id,
        }
    }

    /// JSON payload to enqueue
    pub fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a queue payload
    ///
    /// # Errors
    ///
    /// `Serialization` if the payload is not an object with string `action`
    /// and `runId` fields.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        RunJobMessage::deserialize(payload).map_err(|e| Error::Serialization {
            reason: format!("malformed run job message {}: {}", payload, e),
        })
    }
}
