//! Thread record

use serde::{Deserialize, Serialize};

use super::Metadata;
use crate::contract::Timestamp;
use crate::types::ThreadId;

/// A conversation: the parent of messages and runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Public id (`thrd_...`)
    pub id: ThreadId,
    /// Caller metadata
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Creation time
    pub created_at: Timestamp,
    /// Last modification time
    pub updated_at: Timestamp,
}

impl Thread {
    /// An empty thread with a generated id
    pub fn new() -> Self {
        Self::with_id(ThreadId::generate())
    }

    /// An empty thread with the given id
    pub fn with_id(id: ThreadId) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}
