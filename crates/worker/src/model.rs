//! Language model seam
//!
//! The worker never talks to a vendor SDK directly. It hands a
//! [`ModelClient`] the resolved model name, the thread as chat turns and the
//! resolved instructions, and gets back either the reply text or a
//! [`ModelError`]. The error set is closed: every failure a client can
//! report maps to exactly one `last_error.code`.
//!
//! | ModelError | `last_error.code` |
//! |------------|-------------------|
//! | `RateLimited` | `rate_limit_exceeded` |
//! | `UpstreamServerError` | `server_error` |
//! | `Unknown` | `unknown_error` |

use runkeeper_core::{LastError, LastErrorCode, Message, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a model client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The backend rejected the call for rate limiting
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The backend failed
    #[error("upstream server error: {0}")]
    UpstreamServerError(String),

    /// Anything else, including failures preparing the request
    #[error("model call failed: {0}")]
    Unknown(String),
}

impl ModelError {
    /// The collaborator's detail, verbatim
    pub fn detail(&self) -> &str {
        match self {
            ModelError::RateLimited(detail)
            | ModelError::UpstreamServerError(detail)
            | ModelError::Unknown(detail) => detail,
        }
    }

    /// Classified code for this failure
    pub fn code(&self) -> LastErrorCode {
        match self {
            ModelError::RateLimited(_) => LastErrorCode::RateLimitExceeded,
            ModelError::UpstreamServerError(_) => LastErrorCode::ServerError,
            ModelError::Unknown(_) => LastErrorCode::UnknownError,
        }
    }

    /// The `last_error` recorded on the failed run and step
    pub fn to_last_error(&self) -> LastError {
        LastError::new(self.code(), self.detail())
    }
}

/// Speaker of a chat turn, in the vocabulary chat backends use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human side, including instructions
    User,
    /// The model's own earlier replies
    Model,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker
    pub role: ChatRole,
    /// Text parts, in order
    pub parts: Vec<String>,
}

impl ChatTurn {
    /// A single-part user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![text.into()],
        }
    }

    /// Convert a stored message: `assistant` becomes `model`, anything else `user`
    pub fn from_message(message: &Message) -> Self {
        let role = match message.role {
            Role::Assistant => ChatRole::Model,
            Role::User => ChatRole::User,
        };
        let parts = message
            .content
            .iter()
            .map(|part| match part {
                runkeeper_core::MessageContent::Text { text } => text.value.clone(),
            })
            .collect();
        Self { role, parts }
    }
}

/// A thread prepared for a chat-style backend
///
/// Holds the thread's turns oldest first (never empty) and the resolved
/// instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
    instructions: Option<String>,
}

impl ChatHistory {
    /// Build from a thread's messages
    ///
    /// # Errors
    ///
    /// `ModelError::Unknown` if the thread has no messages; there would be
    /// nothing to reply to.
    pub fn from_messages(
        messages: &[Message],
        instructions: Option<&str>,
    ) -> Result<Self, ModelError> {
        if messages.is_empty() {
            return Err(ModelError::Unknown("thread has no messages".to_string()));
        }
        Ok(Self {
            turns: messages.iter().map(ChatTurn::from_message).collect(),
            instructions: instructions.map(str::to_string),
        })
    }

    /// Every message as a turn, oldest first
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Resolved instructions, if any
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

/// A language model backend
///
/// The trait is object-safe for use as `Arc<dyn ModelClient>`.
pub trait ModelClient: Send + Sync {
    /// Generate the assistant's reply to a conversation
    ///
    /// `turns` is the whole thread oldest first; the last turn is the one to
    /// answer. `instructions` is not repeated inside `turns`.
    fn generate_reply(
        &self,
        model: &str,
        turns: &[ChatTurn],
        instructions: Option<&str>,
    ) -> Result<String, ModelError>;
}
