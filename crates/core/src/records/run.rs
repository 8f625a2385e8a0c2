//! Run record

use serde::{Deserialize, Serialize};

use super::status::{LastError, RunStatus};
use super::Metadata;
use crate::contract::Timestamp;
use crate::error::{Error, Result};
use crate::types::{AssistantId, RunId, ThreadId};

/// An execution of an assistant against a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Public id (`run_...`)
    pub id: RunId,
    /// Owning thread
    pub thread_id: ThreadId,
    /// Assistant whose defaults apply
    pub assistant_id: AssistantId,
    /// Overrides the assistant's model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Overrides the assistant's instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Current status
    pub status: RunStatus,
    /// Creation time
    pub created_at: Timestamp,
    /// When the run entered `in_progress`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the run completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// When the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Timestamp>,
    /// When the run was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,
    /// When the run expired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<Timestamp>,
    /// Failure detail, set together with `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    /// Caller metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Run {
    /// A new queued run with a generated id
    pub fn new(thread_id: ThreadId, assistant_id: AssistantId) -> Self {
        Self::with_id(RunId::generate(), thread_id, assistant_id)
    }

    /// A new queued run with the given id
    pub fn with_id(id: RunId, thread_id: ThreadId, assistant_id: AssistantId) -> Self {
        Self {
            id,
            thread_id,
            assistant_id,
            model: None,
            instructions: None,
            status: RunStatus::Queued,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            expired_at: None,
            last_error: None,
            metadata: Metadata::new(),
        }
    }

    /// Move to `target`, stamping the matching timestamp
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` if the status table forbids the move.
    pub fn transition(&mut self, target: RunStatus, at: Timestamp) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::invalid_state(format!(
                "run {} cannot move from {} to {}",
                self.id, self.status, target
            )));
        }
        match target {
            RunStatus::InProgress => self.started_at = Some(at),
            RunStatus::Completed => self.completed_at = Some(at),
            RunStatus::Failed => self.failed_at = Some(at),
            RunStatus::Cancelled => self.cancelled_at = Some(at),
            RunStatus::Expired => self.expired_at = Some(at),
            RunStatus::Queued | RunStatus::RequiresAction | RunStatus::Cancelling => {}
        }
        self.status = target;
        Ok(())
    }

    /// `queued → in_progress`
    pub fn start(&mut self) -> Result<()> {
        self.transition(RunStatus::InProgress, Timestamp::now())
    }

    /// `in_progress → completed`
    pub fn complete(&mut self) -> Result<()> {
        self.transition(RunStatus::Completed, Timestamp::now())
    }

    /// `in_progress | cancelling → failed`, recording the error
    pub fn fail(&mut self, error: LastError) -> Result<()> {
        self.transition(RunStatus::Failed, Timestamp::now())?;
        self.last_error = Some(error);
        Ok(())
    }

    /// `queued | in_progress → cancelling`
    pub fn request_cancel(&mut self) -> Result<()> {
        self.transition(RunStatus::Cancelling, Timestamp::now())
    }

    /// `cancelling → cancelled`
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(RunStatus::Cancelled, Timestamp::now())
    }

    /// `queued | in_progress → expired`
    pub fn expire(&mut self) -> Result<()> {
        self.transition(RunStatus::Expired, Timestamp::now())
    }
}
