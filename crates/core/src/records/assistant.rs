//! Assistant record

use serde::{Deserialize, Serialize};

use super::Metadata;
use crate::contract::Timestamp;
use crate::types::AssistantId;

/// Model and instruction defaults applied to runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    /// Public id (`asst_...`)
    pub id: AssistantId,
    /// Default model
    pub model: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Caller metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Creation time
    pub created_at: Timestamp,
    /// Last modification time
    pub updated_at: Timestamp,
}

impl Assistant {
    /// An assistant using `model`
    pub fn new(model: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: AssistantId::generate(),
            model: model.into(),
            name: None,
            description: None,
            instructions: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: AssistantId) -> Self {
        self.id = id;
        self
    }

    /// Set the default instructions
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
