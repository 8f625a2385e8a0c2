//! Run step record

use serde::{Deserialize, Serialize};

use super::run::Run;
use super::status::{LastError, StepStatus};
use super::Metadata;
use crate::contract::Timestamp;
use crate::error::{Error, Result};
use crate::types::{AssistantId, MessageId, RunId, StepId, ThreadId};

/// Kind of step; message creation is the only one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// The step produces one assistant message
    MessageCreation,
}

/// Pointer to the message a completed step produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreation {
    /// The produced message
    pub message_id: MessageId,
}

/// Step payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDetails {
    /// Kind of step
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Set once the step completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_creation: Option<MessageCreation>,
}

/// The execution record paired with a run
///
/// A step exists only once its run has left `queued`, and reaches a terminal
/// status in the same commit as its run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Public id (`step_...`)
    pub id: StepId,
    /// Owning run
    pub run_id: RunId,
    /// Thread of the run
    pub thread_id: ThreadId,
    /// Assistant of the run
    pub assistant_id: AssistantId,
    /// Kind of step
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Current status
    pub status: StepStatus,
    /// Payload
    pub step_details: StepDetails,
    /// Creation time
    pub created_at: Timestamp,
    /// When the step completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// When the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Timestamp>,
    /// When the step was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,
    /// When the step expired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<Timestamp>,
    /// Failure detail, same as the run's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    /// Caller metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Step {
    /// A new in-progress message-creation step for `run`
    pub fn for_run(run: &Run) -> Self {
        Self {
            id: StepId::generate(),
            run_id: run.id.clone(),
            thread_id: run.thread_id.clone(),
            assistant_id: run.assistant_id.clone(),
            step_type: StepType::MessageCreation,
            status: StepStatus::InProgress,
            step_details: StepDetails {
                step_type: StepType::MessageCreation,
                message_creation: None,
            },
            created_at: Timestamp::now(),
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            expired_at: None,
            last_error: None,
            metadata: Metadata::new(),
        }
    }

    /// Move to a terminal `target`, stamping the matching timestamp
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the step is `in_progress`.
    pub fn transition(&mut self, target: StepStatus, at: Timestamp) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::invalid_state(format!(
                "step {} cannot move from {} to {}",
                self.id, self.status, target
            )));
        }
        match target {
            StepStatus::Completed => self.completed_at = Some(at),
            StepStatus::Failed => self.failed_at = Some(at),
            StepStatus::Cancelled => self.cancelled_at = Some(at),
            StepStatus::Expired => self.expired_at = Some(at),
            StepStatus::InProgress => {}
        }
        self.status = target;
        Ok(())
    }

    /// Complete, pointing at the produced message
    pub fn complete(&mut self, message_id: MessageId) -> Result<()> {
        self.transition(StepStatus::Completed, Timestamp::now())?;
        self.step_details.message_creation = Some(MessageCreation { message_id });
        Ok(())
    }

    /// Fail with the run's error
    pub fn fail(&mut self, error: LastError) -> Result<()> {
        self.transition(StepStatus::Failed, Timestamp::now())?;
        self.last_error = Some(error);
        Ok(())
    }

    /// Cancel with the run
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(StepStatus::Cancelled, Timestamp::now())
    }

    /// Expire with the run
    pub fn expire(&mut self) -> Result<()> {
        self.transition(StepStatus::Expired, Timestamp::now())
    }

    /// The message a completed step produced
    pub fn message_id(&self) -> Option<&MessageId> {
        self.step_details
            .message_creation
            .as_ref()
            .map(|m| &m.message_id)
    }
}
