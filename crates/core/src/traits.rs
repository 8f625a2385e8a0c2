//! Core traits for the storage substrate
//!
//! `Storage` is the ordered, versioned key-value store underneath the
//! transaction layer. `WorkQueue` is the at-least-once message queue. The
//! transaction manager is the only writer: it validates a read set and then
//! hands the whole write set, together with any queued messages, to
//! `Storage::apply_batch` so records and messages become visible together.

use std::time::Duration;

use crate::contract::{Version, Versioned};
use crate::error::Result;
use crate::types::{Key, KeyPrefix};
use crate::value::Value;

/// Writes, deletes and queue messages applied atomically at one version
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Keys to insert or overwrite
    pub puts: Vec<(Key, Value)>,
    /// Keys to remove
    pub deletes: Vec<Key>,
    /// Queue payloads published with the batch
    pub enqueues: Vec<serde_json::Value>,
}

impl WriteBatch {
    /// True if the batch would change nothing
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty() && self.enqueues.is_empty()
    }
}

/// Storage abstraction for the record store
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Storage: Send + Sync {
    /// Get current value and version for key
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &Key) -> Result<Option<Versioned<Value>>>;

    /// All entries under a prefix, in key order
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_prefix(&self, prefix: &KeyPrefix) -> Result<Vec<(Key, Versioned<Value>)>>;

    /// Version of the most recent commit
    fn current_version(&self) -> Version;

    /// Apply a batch atomically, stamping every written key with `version`
    ///
    /// Readers observe either none or all of the batch, and its queue
    /// messages become receivable only once its records are visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails; nothing is applied.
    fn apply_batch(&self, batch: WriteBatch, version: Version) -> Result<()>;
}

/// A message handed to a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Queue-assigned delivery handle, used to ack or nack
    pub id: u64,
    /// Message payload
    pub payload: serde_json::Value,
    /// 1 on first delivery, incremented on each redelivery
    pub attempt: u32,
}

/// At-least-once message queue
///
/// Messages are unordered and may be redelivered. A receiver must `ack` a
/// delivery once handled; a `nack` or an expired visibility timeout makes it
/// receivable again.
pub trait WorkQueue: Send + Sync {
    /// Publish a message
    fn enqueue(&self, payload: serde_json::Value) -> Result<()>;

    /// Wait up to `timeout` for a message
    fn receive(&self, timeout: Duration) -> Result<Option<Delivery>>;

    /// Mark a delivery as handled
    fn ack(&self, delivery_id: u64) -> Result<()>;

    /// Return a delivery to the queue for redelivery
    fn nack(&self, delivery_id: u64) -> Result<()>;

    /// Messages waiting or in flight
    fn pending(&self) -> usize;
}
