//! Thread message record

use serde::{Deserialize, Serialize};

use super::Metadata;
use crate::contract::Timestamp;
use crate::types::{AssistantId, MessageId, RunId, ThreadId};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Written by the caller
    User,
    /// Produced by a run
    Assistant,
}

/// Text of a content part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text
    pub value: String,
}

/// One part of a message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text {
        /// The text part
        text: TextContent,
    },
}

impl MessageContent {
    /// A text part
    pub fn text(value: impl Into<String>) -> Self {
        MessageContent::Text {
            text: TextContent {
                value: value.into(),
            },
        }
    }
}

/// A message within a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Public id (`msg_...`)
    pub id: MessageId,
    /// Owning thread
    pub thread_id: ThreadId,
    /// Author
    pub role: Role,
    /// Body parts
    pub content: Vec<MessageContent>,
    /// Assistant that authored the message, for assistant messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<AssistantId>,
    /// Run that produced the message, for assistant messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Creation time
    pub created_at: Timestamp,
    /// Caller metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Message {
    /// A user message with one text part
    pub fn user(thread_id: ThreadId, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            thread_id,
            role: Role::User,
            content: vec![MessageContent::text(text)],
            assistant_id: None,
            run_id: None,
            created_at: Timestamp::now(),
            metadata: Metadata::new(),
        }
    }

    /// The assistant reply produced by `run_id`
    pub fn assistant_reply(
        thread_id: ThreadId,
        assistant_id: AssistantId,
        run_id: RunId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            thread_id,
            role: Role::Assistant,
            content: vec![MessageContent::text(text)],
            assistant_id: Some(assistant_id),
            run_id: Some(run_id),
            created_at: Timestamp::now(),
            metadata: Metadata::new(),
        }
    }

    /// All text parts joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                MessageContent::Text { text } => text.value.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
